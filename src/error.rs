//! Crate-level error: aggregates every module's own error enum for the
//! CLI boundary via `From` impls, rather than one flat error type.

use crate::metainfo::MetainfoError;
use crate::swarm::SwarmError;
use crate::tracker::TrackerError;

#[derive(Debug)]
pub enum ClientError {
    Metainfo(MetainfoError),
    Tracker(TrackerError),
    Swarm(SwarmError),
    Io(std::io::Error),
    MissingArgument,
}

impl From<MetainfoError> for ClientError {
    fn from(e: MetainfoError) -> Self {
        ClientError::Metainfo(e)
    }
}

impl From<TrackerError> for ClientError {
    fn from(e: TrackerError) -> Self {
        ClientError::Tracker(e)
    }
}

impl From<SwarmError> for ClientError {
    fn from(e: SwarmError) -> Self {
        ClientError::Swarm(e)
    }
}

impl From<std::io::Error> for ClientError {
    fn from(e: std::io::Error) -> Self {
        ClientError::Io(e)
    }
}
