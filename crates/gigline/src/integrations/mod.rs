//! Adapters for the collaborators the marketplace consumes: a media host and a
//! route-distance service.

pub mod distance;
pub mod drive;
pub mod media;

pub use distance::{
    great_circle_km, DistanceError, DistanceEstimator, OsrmRouteProvider, RouteDistanceProvider,
};
pub use drive::DriveMediaStore;
pub use media::{MediaAsset, MediaError, MediaStore, MediaUpload};
