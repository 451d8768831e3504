use std::{ops::Deref, sync::Arc};

use super::traits::AudioSource;

/// A read-only view of one frame.
///
/// Cheap to create: it only clones an `Arc`, never the samples.
#[derive(Clone)]
pub enum Frame {
    /// Frame `cursor` of a shared source.
    Source {
        source: Arc<dyn AudioSource>,
        cursor: usize,
    },
    /// A frame produced on the fly by a live channel.
    Shared(Arc<[i16]>),
}

impl Frame {
    pub fn from_source(source: Arc<dyn AudioSource>, cursor: usize) -> Self {
        Self::Source { source, cursor }
    }
}

impl Deref for Frame {
    type Target = [i16];

    fn deref(&self) -> &[i16] {
        match self {
            Self::Source { source, cursor } => source.get_frame(*cursor),
            Self::Shared(samples) => samples,
        }
    }
}

impl From<Arc<[i16]>> for Frame {
    fn from(samples: Arc<[i16]>) -> Self {
        Self::Shared(samples)
    }
}

impl From<Vec<i16>> for Frame {
    fn from(samples: Vec<i16>) -> Self {
        Self::Shared(samples.into())
    }
}
