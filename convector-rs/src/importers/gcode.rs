//! G-code (RS-274) decoder for plotter programs.
//!
//! Each pen-down run between rapid moves becomes one stroked path. The
//! machine Y axis points up, so the canvas is flipped into device space.

use super::{text, Importer};
use convector_core::kurbo::Point;
use convector_core::{
    Canvas, ConvectorError, ConvectorResult, CubicBezierParams, QuadraticBezierParams, Transform,
};
use std::collections::HashMap;

const MM_PER_INCH: f64 = 25.4;

/// Recognized codes that this decoder does not implement.
const UNSUPPORTED_G: &[&str] = &["2", "3", "7", "8", "18", "19", "28", "30", "92"];
/// Modal and machine-setup codes without effect on a drawing.
const IGNORED_G: &[&str] = &["4", "17", "40", "49", "54", "61", "64", "80", "90.1", "91.1", "94"];
const IGNORED_M: &[&str] = &["0", "1", "3", "4", "5", "6", "7", "8", "9"];

#[derive(Debug, Clone, Copy, PartialEq)]
enum Motion {
    Rapid,
    Linear,
    Cubic,
    Quadratic,
}

/// Words of one block (line).
#[derive(Debug, Default)]
struct Block {
    g: Vec<String>,
    m: Vec<String>,
    axes: HashMap<char, f64>,
}

pub struct GCodeImporter {
    stroke_width: f64,
    motion: Motion,
    absolute: bool,
    unit: f64,
    position: Point,
    variables: HashMap<u32, f64>,
    drawn: bool,
}

impl GCodeImporter {
    pub fn new(stroke_width: f64) -> Self {
        Self {
            stroke_width,
            motion: Motion::Rapid,
            absolute: true,
            unit: 1.0,
            position: Point::ORIGIN,
            variables: HashMap::new(),
            drawn: false,
        }
    }

    fn flush(&mut self, canvas: &mut Canvas) {
        if self.drawn {
            canvas.stroke();
        }
        canvas.reset_path();
        self.drawn = false;
    }

    /// Resolve the target of a motion, in millimetres.
    fn target(&self, block: &Block, base: Point) -> Point {
        let value = |axis: char| block.axes.get(&axis).map(|v| v * self.unit);
        if self.absolute {
            Point::new(value('X').unwrap_or(base.x), value('Y').unwrap_or(base.y))
        } else {
            Point::new(
                base.x + value('X').unwrap_or(0.0),
                base.y + value('Y').unwrap_or(0.0),
            )
        }
    }

    fn execute(&mut self, block: Block, canvas: &mut Canvas) -> ConvectorResult<bool> {
        for code in &block.g {
            match code.as_str() {
                "0" => self.motion = Motion::Rapid,
                "1" => self.motion = Motion::Linear,
                "5" => self.motion = Motion::Cubic,
                "5.1" => self.motion = Motion::Quadratic,
                "20" => self.unit = MM_PER_INCH,
                "21" => self.unit = 1.0,
                "90" => self.absolute = true,
                "91" => self.absolute = false,
                c if UNSUPPORTED_G.contains(&c) => {
                    return Err(ConvectorError::UnsupportedOperator(format!("G{}", c)))
                }
                c if IGNORED_G.contains(&c) => {
                    log::debug!(target: "import", "G{} ignored", c)
                }
                c => return Err(ConvectorError::UnknownOperator(format!("G{}", c))),
            }
        }

        if block.axes.contains_key(&'X') || block.axes.contains_key(&'Y') {
            let start = self.position;
            let end = self.target(&block, start);
            match self.motion {
                Motion::Rapid => {
                    self.flush(canvas);
                    canvas.move_to(end.x, end.y);
                }
                Motion::Linear => {
                    self.ensure_started(canvas, start);
                    canvas.line_to(end.x, end.y);
                    self.drawn = true;
                }
                Motion::Cubic => {
                    self.ensure_started(canvas, start);
                    let c2 = self.offset(&block, 'P', 'Q', end);
                    if block.axes.contains_key(&'I') || block.axes.contains_key(&'J') {
                        let c1 = self.offset(&block, 'I', 'J', start);
                        canvas.curve_to(&CubicBezierParams {
                            cp1x: c1.x,
                            cp1y: c1.y,
                            cp2x: c2.x,
                            cp2y: c2.y,
                            x: end.x,
                            y: end.y,
                        });
                    } else {
                        canvas.smooth_curve_to(c2.x, c2.y, end.x, end.y);
                    }
                    self.drawn = true;
                }
                Motion::Quadratic => {
                    self.ensure_started(canvas, start);
                    let c = self.offset(&block, 'I', 'J', start);
                    canvas.quad_to(&QuadraticBezierParams {
                        cpx: c.x,
                        cpy: c.y,
                        x: end.x,
                        y: end.y,
                    });
                    self.drawn = true;
                }
            }
            self.position = end;
        }

        for code in &block.m {
            match code.as_str() {
                "2" | "30" => {
                    self.flush(canvas);
                    return Ok(false);
                }
                c if IGNORED_M.contains(&c) => {
                    log::debug!(target: "import", "M{} ignored", c)
                }
                c => return Err(ConvectorError::UnknownOperator(format!("M{}", c))),
            }
        }
        Ok(true)
    }

    /// Control point given as an incremental offset from `base`.
    fn offset(&self, block: &Block, x: char, y: char, base: Point) -> Point {
        let value = |axis: char| block.axes.get(&axis).map(|v| v * self.unit).unwrap_or(0.0);
        Point::new(base.x + value(x), base.y + value(y))
    }

    fn ensure_started(&mut self, canvas: &mut Canvas, start: Point) {
        if canvas.device_point().is_none() {
            canvas.move_to(start.x, start.y);
        }
    }

    /// Split a line into words, evaluating expressions and handling
    /// assignments.
    fn parse_line(&mut self, line: &str) -> ConvectorResult<Option<Block>> {
        let mut lexer = Lexer::new(line);
        let mut block = Block::default();
        let mut any = false;
        while let Some(c) = lexer.peek() {
            if c.is_whitespace() {
                lexer.next();
                continue;
            }
            if c == '#' {
                lexer.next();
                let index = lexer.number()? as u32;
                lexer.skip_whitespace();
                if lexer.eat('=') {
                    let value = self.expression(&mut lexer)?;
                    self.variables.insert(index, value);
                    continue;
                }
                return Err(ConvectorError::malformed(format!(
                    "parameter #{} outside an expression",
                    index
                )));
            }
            let letter = c.to_ascii_uppercase();
            if !letter.is_ascii_alphabetic() {
                return Err(ConvectorError::malformed(format!("unexpected {:?}", c)));
            }
            lexer.next();
            lexer.skip_whitespace();
            any = true;
            match letter {
                'G' | 'M' => {
                    let code = format_code(self.value(&mut lexer)?);
                    if letter == 'G' {
                        block.g.push(code);
                    } else {
                        block.m.push(code);
                    }
                }
                'X' | 'Y' | 'I' | 'J' | 'P' | 'Q' => {
                    let value = self.value(&mut lexer)?;
                    block.axes.insert(letter, value);
                }
                'Z' | 'F' | 'S' | 'T' | 'N' => {
                    self.value(&mut lexer)?;
                }
                other => {
                    return Err(ConvectorError::malformed(format!("unexpected word {}", other)))
                }
            }
        }
        Ok(any.then_some(block))
    }

    /// A word value: number, parameter or bracketed expression.
    fn value(&self, lexer: &mut Lexer) -> ConvectorResult<f64> {
        lexer.skip_whitespace();
        match lexer.peek() {
            Some('[') | Some('#') => self.factor(lexer),
            _ => lexer.number(),
        }
    }

    fn expression(&self, lexer: &mut Lexer) -> ConvectorResult<f64> {
        let mut value = self.term(lexer)?;
        loop {
            lexer.skip_whitespace();
            if lexer.eat('+') {
                value += self.term(lexer)?;
            } else if lexer.eat('-') {
                value -= self.term(lexer)?;
            } else {
                return Ok(value);
            }
        }
    }

    fn term(&self, lexer: &mut Lexer) -> ConvectorResult<f64> {
        let mut value = self.factor(lexer)?;
        loop {
            lexer.skip_whitespace();
            if lexer.eat('*') {
                value *= self.factor(lexer)?;
            } else if lexer.eat('/') {
                let divisor = self.factor(lexer)?;
                if divisor == 0.0 {
                    return Err(ConvectorError::malformed("division by zero"));
                }
                value /= divisor;
            } else {
                return Ok(value);
            }
        }
    }

    fn factor(&self, lexer: &mut Lexer) -> ConvectorResult<f64> {
        lexer.skip_whitespace();
        if lexer.eat('[') {
            let value = self.expression(lexer)?;
            lexer.skip_whitespace();
            if !lexer.eat(']') {
                return Err(ConvectorError::malformed("missing ]"));
            }
            Ok(value)
        } else if lexer.eat('#') {
            let index = lexer.number()? as u32;
            Ok(self.variables.get(&index).copied().unwrap_or(0.0))
        } else if lexer.eat('-') {
            Ok(-self.factor(lexer)?)
        } else {
            lexer.number()
        }
    }
}

impl Importer for GCodeImporter {
    fn process(&mut self, input: &[u8], canvas: &mut Canvas) -> ConvectorResult<()> {
        let source = text(input)?;
        canvas.set_transform(Transform::scaling(1.0, -1.0));
        canvas.set_line_width(self.stroke_width);
        for (number, raw) in source.lines().enumerate() {
            let line = strip_comments(raw);
            let line = line.trim();
            if line.is_empty() || line == "%" {
                continue;
            }
            let block = self.parse_line(line).map_err(|e| match e {
                ConvectorError::MalformedInput(msg) => {
                    ConvectorError::MalformedInput(format!("line {}: {}", number + 1, msg))
                }
                other => other,
            })?;
            if let Some(block) = block {
                if !self.execute(block, canvas)? {
                    return Ok(());
                }
            }
        }
        self.flush(canvas);
        Ok(())
    }
}

/// `G5.1` stays `"5.1"`, `G01` becomes `"1"`.
fn format_code(value: f64) -> String {
    let rounded = (value * 10.0).round() / 10.0;
    if rounded.fract() == 0.0 {
        format!("{}", rounded as i64)
    } else {
        format!("{}", rounded)
    }
}

fn strip_comments(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut depth = 0;
    for c in line.chars() {
        match c {
            ';' if depth == 0 => break,
            '(' => depth += 1,
            ')' if depth > 0 => depth -= 1,
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(line: &'a str) -> Self {
        Self {
            chars: line.chars().peekable(),
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn next(&mut self) -> Option<char> {
        self.chars.next()
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.chars.next();
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.chars.next();
        }
    }

    fn number(&mut self) -> ConvectorResult<f64> {
        self.skip_whitespace();
        let mut s = String::new();
        if let Some(c @ ('+' | '-')) = self.peek() {
            s.push(c);
            self.chars.next();
        }
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || c == '.' {
                s.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        s.parse::<f64>()
            .map_err(|_| ConvectorError::malformed(format!("expected a number, found {:?}", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn run(program: &str) -> ConvectorResult<Canvas> {
        let mut canvas = Canvas::new();
        GCodeImporter::new(1.0).process(program.as_bytes(), &mut canvas)?;
        Ok(canvas)
    }

    #[test]
    fn test_rapid_moves_split_strokes() {
        let canvas = run("G21 G90\nG0 X0 Y0\nG1 X10 Y0\nG1 X10 Y10\nG0 X20 Y20\nG1 X30 Y20\nM30\n").unwrap();
        assert_eq!(canvas.drawing().len(), 2);
    }

    #[test]
    fn test_modal_motion_and_missing_axes() {
        let canvas = run("G0 X0 Y0\nG1 X10\nY10\nX0\n").unwrap();
        let bounds = canvas.drawing().bounds().unwrap();
        // Open outline with butt caps: the pen overhangs on three sides
        assert!((bounds.x0 - 0.0).abs() < 1e-6);
        assert!((bounds.x1 - 10.5).abs() < 1e-6);
        assert!((bounds.height() - 11.0).abs() < 1e-6);
    }

    #[test]
    fn test_inches_and_relative() {
        let canvas = run("G20 G91\nG0 X1 Y1\nG1 X1\n").unwrap();
        let bounds = canvas.drawing().bounds().unwrap();
        assert!((bounds.width() - 25.4).abs() < 1e-6);
        assert!((bounds.x0 - 25.4).abs() < 1e-6);
    }

    #[test]
    fn test_y_axis_points_up() {
        let canvas = run("G0 X0 Y0\nG1 X0 Y10\n").unwrap();
        let bounds = canvas.drawing().bounds().unwrap();
        assert!(bounds.y1 <= 1e-9);
        assert!((bounds.y0 + 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_curves() {
        let canvas = run("G0 X0 Y0\nG5 I0 J10 P0 Q10 X10 Y0\nG5.1 I5 J-5 X20 Y0\n").unwrap();
        assert_eq!(canvas.drawing().len(), 1);
    }

    #[test]
    fn test_variables_and_expressions() {
        let canvas = run("#1=2\n#2=[#1*3+1]\nG0 X0 Y0\nG1 X#2 Y[#1+#1]\n").unwrap();
        let bounds = canvas.drawing().bounds().unwrap();
        // Line to (7, 4)
        assert!(bounds.x1 > 7.0 && bounds.x1 < 7.5);
        assert!(bounds.y0 < -4.0 && bounds.y0 > -4.5);
    }

    #[test]
    fn test_comments_are_skipped() {
        let canvas = run("(header) G0 X0 Y0 ; move\nG1 X5 (draw) Y5\n").unwrap();
        assert_eq!(canvas.drawing().len(), 1);
    }

    #[test]
    fn test_program_end_stops_reading() {
        let canvas = run("G0 X0 Y0\nG1 X5\nM2\nG1 Q\n").unwrap();
        assert_eq!(canvas.drawing().len(), 1);
    }

    #[rstest]
    #[case("G2 X1 Y1 I1 J0")]
    #[case("G92 X0")]
    #[case("G28")]
    fn test_unsupported_codes(#[case] program: &str) {
        assert!(matches!(
            run(program),
            Err(ConvectorError::UnsupportedOperator(_))
        ));
    }

    #[rstest]
    #[case("G99")]
    #[case("M123")]
    fn test_unknown_codes(#[case] program: &str) {
        assert!(matches!(run(program), Err(ConvectorError::UnknownOperator(_))));
    }

    #[rstest]
    #[case("G1 Xabc")]
    #[case("G1 X[1+2")]
    #[case("K5")]
    fn test_malformed_words(#[case] program: &str) {
        assert!(matches!(run(program), Err(ConvectorError::MalformedInput(_))));
    }

    #[test]
    fn test_format_code() {
        assert_eq!(format_code(1.0), "1");
        assert_eq!(format_code(5.1), "5.1");
        assert_eq!(format_code(90.0), "90");
    }
}
