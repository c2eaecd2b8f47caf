//! PostScript decoder: a small interpreter for the drawing subset of the
//! language.
//!
//! Device space is Y-down, so the interpreter starts with the transform
//! `[1 0 0 -1 0 792]` mapping a US-letter page onto it. The clip starts
//! unbounded.

mod interpreter;
mod lexer;
mod operators;
mod value;

pub(crate) use interpreter::Interpreter;

use super::Importer;
use convector_core::{Canvas, ConvectorResult, Transform};

/// Height of a US-letter page in points.
const PAGE_HEIGHT: f64 = 792.0;

#[derive(Debug, Default)]
pub struct PsImporter;

impl PsImporter {
    pub fn new() -> Self {
        Self
    }
}

impl Importer for PsImporter {
    fn process(&mut self, input: &[u8], canvas: &mut Canvas) -> ConvectorResult<()> {
        canvas.set_transform(Transform::new(1.0, 0.0, 0.0, -1.0, 0.0, PAGE_HEIGHT));
        let mut interpreter = Interpreter::new();
        let result = interpreter.run(input, canvas);
        if !interpreter.operands.is_empty() {
            log::debug!(
                target: "import",
                "{} operands left on the stack",
                interpreter.operands.len()
            );
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use convector_core::{Color, ConvectorError};
    use rstest::rstest;

    fn run(program: &str) -> ConvectorResult<Canvas> {
        let mut canvas = Canvas::new();
        PsImporter::new().process(program.as_bytes(), &mut canvas)?;
        Ok(canvas)
    }

    fn stack_of(program: &str) -> Vec<f64> {
        let mut canvas = Canvas::new();
        let mut interpreter = Interpreter::new();
        interpreter.run(program.as_bytes(), &mut canvas).unwrap();
        interpreter
            .operands
            .iter()
            .map(|v| match v {
                value::Value::Number(n) => *n,
                value::Value::Bool(b) => *b as i32 as f64,
                value::Value::Mark => -1.0,
                other => panic!("unexpected {:?}", other),
            })
            .collect()
    }

    #[test]
    fn test_filled_square_is_flipped() {
        let canvas = run("newpath 100 100 moveto 200 100 lineto 200 200 lineto closepath \
                          1 0 0 setrgbcolor fill")
            .unwrap();
        let splashes = canvas.drawing().splashes();
        assert_eq!(splashes.len(), 1);
        assert_eq!(splashes[0].color, Color::rgb(255, 0, 0));
        let bounds = splashes[0].region.bounds().unwrap();
        assert!((bounds.y0 - 592.0).abs() < 1e-9);
        assert!((bounds.y1 - 692.0).abs() < 1e-9);
    }

    #[test]
    fn test_fill_starts_a_new_path() {
        let canvas = run("0 0 moveto 10 0 lineto 10 10 lineto fill 0.5 setgray fill").unwrap();
        assert_eq!(canvas.drawing().len(), 1);
    }

    #[test]
    fn test_procedures_and_loops() {
        let canvas = run("/box { newpath moveto 10 0 rlineto 0 10 rlineto -10 0 rlineto \
                          closepath fill } def \
                          0 20 100 { 0 box } for")
            .unwrap();
        assert_eq!(canvas.drawing().len(), 6);
    }

    #[rstest]
    #[case("1 2 add 3 mul", vec![9.0])]
    #[case("7 2 idiv 7 2 mod", vec![3.0, 1.0])]
    #[case("1 2 3 3 1 roll", vec![3.0, 1.0, 2.0])]
    #[case("1 2 exch dup", vec![2.0, 1.0, 1.0])]
    #[case("1 2 3 2 copy", vec![1.0, 2.0, 3.0, 2.0, 3.0])]
    #[case("5 6 7 1 index", vec![5.0, 6.0, 7.0, 6.0])]
    #[case("mark 1 2 counttomark", vec![-1.0, 1.0, 2.0, 2.0])]
    #[case("2.5 round -2.5 round 2.7 truncate", vec![3.0, -2.0, 2.0])]
    #[case("0 1 atan 1 0 atan", vec![0.0, 90.0])]
    #[case("[1 2 3] length", vec![3.0])]
    #[case("[4 5 6] 1 get", vec![5.0])]
    #[case("/d 2 dict def d /k 42 put d /k get", vec![42.0])]
    #[case("3 4 lt 3 4 gt", vec![1.0, 0.0])]
    #[case("true false or not", vec![0.0])]
    #[case("0 1 1 4 { add } for", vec![10.0])]
    #[case("0 [1 2 3] { add } forall", vec![6.0])]
    #[case("0 { 1 add dup 5 eq { exit } if } loop", vec![5.0])]
    #[case("3 { 1 } repeat", vec![1.0, 1.0, 1.0])]
    #[case("{ 1 0 div } stopped", vec![1.0])]
    #[case("{ 2 } stopped", vec![2.0, 0.0])]
    #[case("1 true { 2 } { 3 } ifelse", vec![1.0, 2.0])]
    #[case("/x 5 def /x load x", vec![5.0, 5.0])]
    #[case("[1 2] aload pop", vec![1.0, 2.0])]
    #[case("1 2 << /a 1 >> begin a end", vec![1.0, 2.0, 1.0])]
    #[case("(12.5) cvr 12.9 cvi", vec![12.5, 12.0])]
    #[case("16#ff 8#17", vec![255.0, 15.0])]
    fn test_stack_results(#[case] program: &str, #[case] expected: Vec<f64>) {
        let result = stack_of(program);
        assert_eq!(result.len(), expected.len(), "{:?}", result);
        for (a, b) in result.iter().zip(&expected) {
            assert!((a - b).abs() < 1e-9, "{:?} != {:?}", result, expected);
        }
    }

    #[test]
    fn test_bind_and_exec() {
        assert_eq!(stack_of("/f { 2 mul } bind def 4 f { 1 add } exec"), vec![9.0]);
    }

    #[test]
    fn test_arc_draws_a_circle() {
        let canvas = run("newpath 300 400 50 0 360 arc closepath fill").unwrap();
        let bounds = canvas.drawing().bounds().unwrap();
        assert!((bounds.width() - 100.0).abs() < 1e-3);
        assert!((bounds.center().y - 392.0).abs() < 1e-3);
    }

    #[test]
    fn test_gsave_grestore_restore_color() {
        let canvas = run("gsave 0 0 1 setrgbcolor grestore \
                          0 0 moveto 10 0 lineto 10 10 lineto fill")
            .unwrap();
        assert_eq!(canvas.drawing().splashes()[0].color, Color::BLACK);
    }

    #[test]
    fn test_clip_limits_painting() {
        let canvas = run("0 0 moveto 10 0 lineto 10 10 lineto 0 10 lineto closepath clip newpath \
                          -50 -50 moveto 50 -50 lineto 50 50 lineto -50 50 lineto fill")
            .unwrap();
        let area = canvas.drawing().splashes()[0].region.area();
        assert!((area - 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_stroke_width_follows_scale() {
        let canvas = run("2 2 scale 1 setlinewidth 0 0 moveto 100 0 lineto stroke").unwrap();
        let bounds = canvas.drawing().bounds().unwrap();
        assert!((bounds.height() - 2.0).abs() < 1e-6);
        assert!((bounds.width() - 200.0).abs() < 1e-6);
    }

    #[test]
    fn test_currentpoint_and_pathbbox() {
        assert_eq!(
            stack_of("10 20 moveto 30 5 lineto currentpoint pathbbox"),
            vec![30.0, 5.0, 10.0, 5.0, 30.0, 20.0]
        );
    }

    #[test]
    fn test_quit_stops_execution() {
        let canvas = run("quit 0 0 moveto 10 0 lineto 0 10 lineto fill").unwrap();
        assert!(canvas.drawing().is_empty());
    }

    #[test]
    fn test_show_without_fonts_paints_nothing() {
        let canvas =
            run("/Helvetica findfont 12 scalefont setfont 10 10 moveto (Hi) show").unwrap();
        assert!(canvas.drawing().is_empty());
        assert_eq!(canvas.state().font.family, "Helvetica");
        assert_eq!(canvas.state().font.size, 12.0);
    }

    #[rstest]
    #[case("1 2 3 4 5 6 7 8 image")]
    #[case("matrix currentmatrix")]
    fn test_unsupported_operators(#[case] program: &str) {
        assert!(matches!(run(program), Err(ConvectorError::UnsupportedOperator(_))));
    }

    #[test]
    fn test_undefined_name() {
        assert!(matches!(
            run("1 frobnicate"),
            Err(ConvectorError::UnknownOperator(n)) if n == "frobnicate"
        ));
    }

    #[rstest]
    #[case("add")]
    #[case("(a) 1 add")]
    #[case("{ 1 2")]
    #[case("1 2 }")]
    #[case("]")]
    #[case("0 0 rlineto")]
    fn test_malformed_programs(#[case] program: &str) {
        assert!(matches!(run(program), Err(ConvectorError::MalformedInput(_))));
    }
}
