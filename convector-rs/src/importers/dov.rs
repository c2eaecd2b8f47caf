//! Compact binary decoder.
//!
//! Layout: the magic `23 39 FF AF`, width and height as big-endian `u16`,
//! then a stream of `u16` pairs. `FFFF 0001 x y` moves the pen, any other
//! pair `x y` draws a line to it, and a lone `FFFF` ends the stream.

use super::Importer;
use convector_core::{Canvas, ConvectorError, ConvectorResult, Transform, WindingRule, EXTENT};

pub(crate) const MAGIC: [u8; 4] = [0x23, 0x39, 0xFF, 0xAF];
pub(crate) const ESCAPE: u16 = 0xFFFF;
pub(crate) const MOVE_TAG: u16 = 0x0001;

#[derive(Debug, Default)]
pub struct DovImporter;

impl DovImporter {
    pub fn new() -> Self {
        Self
    }
}

struct Words<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Words<'a> {
    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn next(&mut self) -> ConvectorResult<u16> {
        match self.input.get(self.pos..self.pos + 2) {
            Some(&[hi, lo]) => {
                self.pos += 2;
                Ok(u16::from_be_bytes([hi, lo]))
            }
            _ => Err(ConvectorError::malformed(format!(
                "truncated word at byte {}",
                self.pos
            ))),
        }
    }

    fn point(&mut self) -> ConvectorResult<(f64, f64)> {
        let x = self.next()?;
        let y = self.next()?;
        Ok((x as f64, y as f64))
    }
}

impl Importer for DovImporter {
    fn process(&mut self, input: &[u8], canvas: &mut Canvas) -> ConvectorResult<()> {
        if !input.starts_with(&MAGIC) {
            return Err(ConvectorError::malformed("missing compact binary magic"));
        }
        let mut words = Words {
            input,
            pos: MAGIC.len(),
        };
        let width = words.next()?;
        let height = words.next()?;
        let ratio = width.max(height) as f64 / EXTENT;
        log::debug!(target: "import", "compact binary {}x{}", width, height);
        if ratio > 0.0 {
            canvas.set_transform(Transform::scaling(ratio, ratio));
            canvas.set_line_width(1.0 / ratio);
        }
        canvas.set_winding_rule(WindingRule::EvenOdd);

        let mut terminated = false;
        while !words.at_end() {
            let x = words.next()?;
            if x == ESCAPE {
                if words.at_end() {
                    terminated = true;
                    break;
                }
                let tag = words.next()?;
                if tag != MOVE_TAG {
                    return Err(ConvectorError::malformed(format!(
                        "unknown tag {:#06x} at byte {}",
                        tag,
                        words.pos - 2
                    )));
                }
                let (x, y) = words.point()?;
                canvas.move_to(x, y);
                continue;
            }
            let y = words.next()?;
            if y == ESCAPE {
                return Err(ConvectorError::malformed(format!(
                    "coordinate out of range at byte {}",
                    words.pos - 2
                )));
            }
            canvas.line_to(x as f64, y as f64);
        }
        if !terminated {
            log::warn!(target: "import", "compact binary stream has no terminator");
        }
        canvas.fill();
        canvas.reset_path();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn encode(width: u16, height: u16, words: &[u16]) -> Vec<u8> {
        let mut out = MAGIC.to_vec();
        for w in [width, height].iter().chain(words) {
            out.extend_from_slice(&w.to_be_bytes());
        }
        out
    }

    fn decode(input: &[u8]) -> ConvectorResult<Canvas> {
        let mut canvas = Canvas::new();
        DovImporter::new().process(input, &mut canvas)?;
        Ok(canvas)
    }

    #[test]
    fn test_square_is_one_even_odd_splash() {
        let input = encode(
            65535,
            32768,
            &[
                0xFFFF, 0x0001, 0, 0, 1000, 0, 1000, 1000, 0, 1000, // outer
                0xFFFF, 0x0001, 250, 250, 750, 250, 750, 750, 250, 750, // hole
                0xFFFF,
            ],
        );
        let canvas = decode(&input).unwrap();
        let splashes = canvas.drawing().splashes();
        assert_eq!(splashes.len(), 1);
        assert_eq!(splashes[0].region.rule(), WindingRule::EvenOdd);
        assert!((splashes[0].region.area() - 750_000.0).abs() < 1.0);
    }

    #[test]
    fn test_scale_follows_header() {
        let input = encode(6553, 100, &[0xFFFF, 0x0001, 0, 0, 65535 - 1, 0, 0, 100, 0xFFFF]);
        let bounds = decode(&input).unwrap().drawing().bounds().unwrap();
        assert!((bounds.x1 - 6553.0 * 65534.0 / 65535.0).abs() < 1e-6);
        assert!((bounds.y1 - 100.0 * 6553.0 / 65535.0).abs() < 1e-6);
    }

    #[test]
    fn test_missing_terminator_is_accepted() {
        let input = encode(100, 100, &[0xFFFF, 0x0001, 0, 0, 100, 0, 0, 100]);
        assert_eq!(decode(&input).unwrap().drawing().len(), 1);
    }

    #[rstest]
    #[case(b"\x23\x39\xFF\xAE\0\x10\0\x10".to_vec())]
    #[case(encode(10, 10, &[0xFFFF, 0x0002, 1, 1]))]
    #[case(encode(10, 10, &[5, 0xFFFF, 3, 3]))]
    #[case(encode(10, 10, &[0xFFFF, 0x0001, 1]))]
    #[case({
        let mut v = encode(10, 10, &[1, 2]);
        v.push(7);
        v
    })]
    fn test_malformed(#[case] input: Vec<u8>) {
        assert!(matches!(decode(&input), Err(ConvectorError::MalformedInput(_))));
    }
}
