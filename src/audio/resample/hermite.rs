//! Cubic Hermite (Catmull-Rom) mono resampler.
//!
//! Four-point interpolation. Used for every decoded source that is not
//! already at 48 kHz.

const HISTORY: usize = 3;

pub struct HermiteResampler {
    /// Input samples consumed per output sample.
    step: f64,
    /// Read head, relative to the start of the next input block.
    pos: f64,
    /// Last samples of the previous block, oldest first.
    hist: [f32; HISTORY],
}

impl HermiteResampler {
    pub fn new(source_rate: u32, target_rate: u32) -> Self {
        Self {
            step: source_rate as f64 / target_rate as f64,
            pos: 0.0,
            hist: [0.0; HISTORY],
        }
    }

    /// `p = [p0, p1, p2, p3]`; the result lies between p1 and p2 at `t ∈ [0, 1)`.
    #[inline]
    fn hermite(p: [f32; 4], t: f32) -> f32 {
        let c0 = p[1];
        let c1 = 0.5 * (p[2] - p[0]);
        let c2 = p[0] - 2.5 * p[1] + 2.0 * p[2] - 0.5 * p[3];
        let c3 = 0.5 * (p[3] - p[0]) + 1.5 * (p[1] - p[2]);
        ((c3 * t + c2) * t + c1) * t + c0
    }

    #[inline]
    fn at(&self, input: &[i16], k: isize) -> f32 {
        if k >= 0 {
            input[k as usize] as f32
        } else {
            self.hist[(HISTORY as isize + k) as usize]
        }
    }

    pub fn process(&mut self, input: &[i16], output: &mut Vec<i16>) {
        let n = input.len() as isize;
        if n == 0 {
            return;
        }

        loop {
            let base = self.pos.floor() as isize;
            if base + 2 >= n {
                break;
            }
            let t = (self.pos - base as f64) as f32;
            let p = [
                self.at(input, base - 1),
                self.at(input, base),
                self.at(input, base + 1),
                self.at(input, base + 2),
            ];
            output.push(
                Self::hermite(p, t)
                    .round()
                    .clamp(i16::MIN as f32, i16::MAX as f32) as i16,
            );
            self.pos += self.step;
        }
        self.pos -= n as f64;

        let mut window = [0.0f32; HISTORY];
        for (i, slot) in window.iter_mut().enumerate() {
            *slot = self.at(input, n - HISTORY as isize + i as isize);
        }
        self.hist = window;
    }

    /// Emits the tail by holding the last sample.
    pub fn flush(&mut self, output: &mut Vec<i16>) {
        let last = self.hist[HISTORY - 1] as i16;
        self.process(&[last, last], output);
    }
}
