use super::domain::{Coordinates, JobLocation, JobSubmission, Urgency};

const MAX_TITLE_CHARS: usize = 120;
const MAX_DESCRIPTION_CHARS: usize = 2000;
const MAX_SKILL_CHARS: usize = 60;

/// Validation errors raised while turning a submission into a postable job.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IntakeViolation {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("{field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },
    #[error("an address is required: provide a city or coordinates")]
    MissingLocation,
    #[error("latitude and longitude must be provided together")]
    PartialCoordinates,
    #[error("coordinates are out of range (lat {latitude}, lng {longitude})")]
    InvalidCoordinates { latitude: f64, longitude: f64 },
}

/// Sanitized job fields ready to be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct JobDraft {
    pub title: String,
    pub description: String,
    pub skill: String,
    pub urgency: Urgency,
    pub location: JobLocation,
}

/// Produce a [`JobDraft`] from raw client input.
pub fn draft_from_submission(submission: JobSubmission) -> Result<JobDraft, IntakeViolation> {
    let title = required("title", &submission.title, MAX_TITLE_CHARS)?;
    let description = required("description", &submission.description, MAX_DESCRIPTION_CHARS)?;
    let skill = required("skill", &submission.skill, MAX_SKILL_CHARS)?;

    let city = submission
        .city
        .map(|city| city.trim().to_string())
        .filter(|city| !city.is_empty());

    let coordinates = match (submission.latitude, submission.longitude) {
        (Some(latitude), Some(longitude)) => {
            let point = Coordinates {
                latitude,
                longitude,
            };
            if !point.is_valid() {
                return Err(IntakeViolation::InvalidCoordinates {
                    latitude,
                    longitude,
                });
            }
            Some(point)
        }
        (None, None) => None,
        _ => return Err(IntakeViolation::PartialCoordinates),
    };

    if city.is_none() && coordinates.is_none() {
        return Err(IntakeViolation::MissingLocation);
    }

    Ok(JobDraft {
        title,
        description,
        skill,
        urgency: submission.urgency,
        location: JobLocation { city, coordinates },
    })
}

fn required(field: &'static str, raw: &str, max: usize) -> Result<String, IntakeViolation> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(IntakeViolation::MissingField(field));
    }
    if value.chars().count() > max {
        return Err(IntakeViolation::TooLong { field, max });
    }
    Ok(value.to_string())
}
