mod claim;
mod common;
mod lifecycle;
