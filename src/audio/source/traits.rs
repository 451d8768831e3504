/// Common trait implemented by every frame-addressable audio source.
///
/// Cursors are frame indices, never byte or sample offsets. A source is
/// shared read-only between every listener playing it, so both methods take
/// `&self` and must not mutate anything observable.
pub trait AudioSource: Send + Sync {
    /// Whether a full frame exists at `cursor`.
    ///
    /// Live sources without a fixed length may ignore `cursor`.
    fn has_frame(&self, cursor: usize) -> bool;

    /// The frame at `cursor`: exactly `FRAME_SIZE` mono i16 samples.
    ///
    /// May be called several times with the same cursor (once per listener).
    /// Returns an empty slice when no frame exists.
    fn get_frame(&self, cursor: usize) -> &[i16];

    /// Number of frames, if the source is finite.
    fn frame_count(&self) -> Option<usize> {
        None
    }
}
