use crate::audio::constants::{INT16_MAX_F, INT16_MIN_F};

/// Adds `frame * volume` onto `target`, clamping every sample to the i16
/// range as it goes.
///
/// Each call clamps on its own, so the result depends on call order.
#[inline]
pub fn mix_frame(target: &mut [i16], frame: &[i16], volume: f32) {
    if volume == 1.0 {
        for (t, &s) in target.iter_mut().zip(frame) {
            *t = t.saturating_add(s);
        }
        return;
    }

    for (t, &s) in target.iter_mut().zip(frame) {
        let scaled = (s as f32 * volume) as i32;
        *t = (*t as i32 + scaled).clamp(INT16_MIN_F as i32, INT16_MAX_F as i32) as i16;
    }
}
