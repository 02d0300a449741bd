use crate::block::{BlockInstance, ParamValue};
use crate::registry::{BlockName, BlockShape};
use crate::stage::{Stage, ANSWER, SPRITE_RADIUS, STAGE_HEIGHT, STAGE_WIDTH};
use crate::value::{compare, equals, round_half_up, Value};
use log::warn;
use rand::Rng;
use std::cmp::Ordering;

/// Resolves parameter values and evaluates reporter blocks for one sprite,
/// against a stage the caller has locked for the duration.
pub struct Evaluator<'a> {
    stage: &'a Stage,
    sprite_id: &'a str,
    max_depth: usize,
}

impl<'a> Evaluator<'a> {
    pub fn new(stage: &'a Stage, sprite_id: &'a str, max_depth: usize) -> Self {
        Self {
            stage,
            sprite_id,
            max_depth,
        }
    }

    /// Unbound parameters resolve to the empty string.
    pub fn resolve(&self, value: Option<&ParamValue>) -> Value {
        self.resolve_at(value, 0)
    }

    pub fn param(&self, block: &BlockInstance, name: &str) -> Value {
        self.resolve(block.param(name))
    }

    pub fn number(&self, block: &BlockInstance, name: &str) -> f64 {
        self.param(block, name).to_number()
    }

    pub fn text(&self, block: &BlockInstance, name: &str) -> String {
        self.param(block, name).to_string()
    }

    pub fn truthy(&self, block: &BlockInstance, name: &str) -> bool {
        self.param(block, name).is_truthy()
    }

    pub fn evaluate(&self, block: &BlockInstance) -> Value {
        self.evaluate_at(block, 0)
    }

    fn resolve_at(&self, value: Option<&ParamValue>, depth: usize) -> Value {
        match value {
            None => Value::empty(),
            Some(ParamValue::Literal(v)) => v.clone(),
            Some(ParamValue::Variable(name)) => self.stage.variable(name),
            Some(ParamValue::Reporter(block)) => self.evaluate_at(block, depth + 1),
        }
    }

    fn evaluate_at(&self, block: &BlockInstance, depth: usize) -> Value {
        if depth > self.max_depth {
            warn!("expression nested deeper than {}, using empty value", self.max_depth);
            return Value::empty();
        }
        if block.shape() != BlockShape::Reporter {
            return Value::empty();
        }

        let param = |name: &str| self.resolve_at(block.param(name), depth);
        let num = |name: &str| param(name).to_number();
        let text = |name: &str| param(name).to_string();
        let sprite = self.stage.sprite(self.sprite_id);

        match block.name() {
            BlockName::MotionXPosition => sprite.map_or(Value::empty(), |s| Value::Number(s.x)),
            BlockName::MotionYPosition => sprite.map_or(Value::empty(), |s| Value::Number(s.y)),
            BlockName::MotionDirection => {
                sprite.map_or(Value::empty(), |s| Value::Number(s.rotation))
            }
            BlockName::LooksCostumeNumber => {
                sprite.map_or(Value::empty(), |s| Value::Number(s.costume_number() as f64))
            }
            BlockName::LooksSize => sprite.map_or(Value::empty(), |s| Value::Number(s.size)),
            BlockName::SoundVolume => sprite.map_or(Value::empty(), |s| Value::Number(s.volume)),

            BlockName::SensingAnswer => self.stage.variable(ANSWER),
            BlockName::SensingMouseX => Value::Number(self.stage.input.mouse.x),
            BlockName::SensingMouseY => Value::Number(self.stage.input.mouse.y),
            BlockName::SensingKeyPressed => Value::from(self.stage.input.is_pressed(&text("key"))),
            BlockName::SensingTouching => Value::from(self.touching(&text("target"))),

            BlockName::VariablesReporter => self.stage.variable(&text("variable")),

            BlockName::OperatorsAdd => Value::Number(num("NUM1") + num("NUM2")),
            BlockName::OperatorsSubtract => Value::Number(num("NUM1") - num("NUM2")),
            BlockName::OperatorsMultiply => Value::Number(num("NUM1") * num("NUM2")),
            BlockName::OperatorsDivide => {
                let (n1, n2) = (num("NUM1"), num("NUM2"));
                if n2 == 0.0 {
                    Value::Number(f64::INFINITY)
                } else {
                    Value::Number(n1 / n2)
                }
            }
            BlockName::OperatorsRandom => {
                let from = round_half_up(num("FROM")) as i64;
                let to = round_half_up(num("TO")) as i64;
                let (low, high) = (from.min(to), from.max(to));
                Value::Number(rand::thread_rng().gen_range(low..=high) as f64)
            }
            BlockName::OperatorsGt => {
                Value::from(compare(&param("OPERAND1"), &param("OPERAND2")) == Ordering::Greater)
            }
            BlockName::OperatorsLt => {
                Value::from(compare(&param("OPERAND1"), &param("OPERAND2")) == Ordering::Less)
            }
            BlockName::OperatorsEquals => {
                Value::from(equals(&param("OPERAND1"), &param("OPERAND2")))
            }
            BlockName::OperatorsAnd => {
                Value::from(param("OPERAND1").is_truthy() && param("OPERAND2").is_truthy())
            }
            BlockName::OperatorsOr => {
                Value::from(param("OPERAND1").is_truthy() || param("OPERAND2").is_truthy())
            }
            BlockName::OperatorsNot => Value::from(!param("OPERAND").is_truthy()),
            BlockName::OperatorsJoin => Value::Text(text("STRING1") + &text("STRING2")),
            BlockName::OperatorsLetterOf => {
                let index = num("LETTER");
                let letter = if index >= 1.0 && index.fract() == 0.0 {
                    text("STRING").chars().nth(index as usize - 1)
                } else {
                    None
                };
                letter.map_or(Value::empty(), |c| Value::Text(c.to_string()))
            }
            BlockName::OperatorsLength => Value::Number(text("STRING").chars().count() as f64),
            BlockName::OperatorsContains => Value::from(
                text("STRING1")
                    .to_lowercase()
                    .contains(&text("STRING2").to_lowercase()),
            ),
            BlockName::OperatorsMod => Value::Number(num("NUM1") % num("NUM2")),
            BlockName::OperatorsRound => Value::Number(round_half_up(num("NUM"))),
            BlockName::OperatorsMathOp => {
                math_op(&text("OP"), num("NUM")).map_or(Value::empty(), Value::Number)
            }
            _ => Value::empty(),
        }
    }

    fn touching(&self, target: &str) -> bool {
        let Some(sprite) = self.stage.sprite(self.sprite_id) else {
            return false;
        };
        let radius = SPRITE_RADIUS * sprite.size / 100.0;
        match target {
            "_mouse_" => sprite.position().distance_to(self.stage.input.mouse) <= radius,
            "_edge_" => {
                sprite.x.abs() + radius >= STAGE_WIDTH / 2.0
                    || sprite.y.abs() + radius >= STAGE_HEIGHT / 2.0
            }
            _ => false,
        }
    }
}

/// Trigonometric operators work in degrees. Sine and cosine are rounded to ten
/// decimals so that `sin of 180` is exactly zero.
pub fn math_op(op: &str, n: f64) -> Option<f64> {
    let rounded = |v: f64| (v * 1e10).round() / 1e10;
    let result = match op {
        "abs" => n.abs(),
        "floor" => n.floor(),
        "ceiling" => n.ceil(),
        "sqrt" => n.sqrt(),
        "sin" => rounded(n.to_radians().sin()),
        "cos" => rounded(n.to_radians().cos()),
        "tan" => n.to_radians().tan(),
        "asin" => n.asin().to_degrees(),
        "acos" => n.acos().to_degrees(),
        "atan" => n.atan().to_degrees(),
        "ln" => n.ln(),
        "log" => n.log10(),
        "e ^" => n.exp(),
        "10 ^" => 10f64.powf(n),
        _ => return None,
    };
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::find_template;
    use crate::stage::SpriteState;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn reporter(name: BlockName) -> BlockInstance {
        BlockInstance::detached(find_template(name).unwrap())
    }

    fn stage() -> Stage {
        let mut stage = Stage::new();
        stage
            .sprites
            .insert("s1".to_string(), SpriteState::new("s1", "Sprite1", None));
        stage
    }

    fn eval(stage: &Stage, block: &BlockInstance) -> Value {
        Evaluator::new(stage, "s1", 64).evaluate(block)
    }

    #[test]
    fn divide_by_zero_is_positive_infinity() {
        let stage = stage();
        let divide = reporter(BlockName::OperatorsDivide)
            .with_param("NUM1", 5.0)
            .with_param("NUM2", 0.0);
        assert_eq!(eval(&stage, &divide), Value::Number(f64::INFINITY));
    }

    #[test]
    fn undeclared_variables_read_as_empty() {
        let stage = stage();
        let evaluator = Evaluator::new(&stage, "s1", 64);
        assert_eq!(
            evaluator.resolve(Some(&ParamValue::variable("nope"))),
            Value::empty()
        );
        let reporter = reporter(BlockName::VariablesReporter).with_param("variable", "nope");
        assert_eq!(evaluator.evaluate(&reporter), Value::empty());
    }

    #[test]
    fn nested_reporters_evaluate_recursively() {
        let mut stage = stage();
        stage.set_variable("n", Value::Number(4.0));
        let inner = reporter(BlockName::OperatorsMultiply)
            .with_param("NUM1", ParamValue::variable("n"))
            .with_param("NUM2", "3");
        let outer = reporter(BlockName::OperatorsAdd)
            .with_param("NUM1", inner)
            .with_param("NUM2", "x");
        assert_eq!(eval(&stage, &outer), Value::Number(12.0));
    }

    #[test]
    fn depth_cap_yields_empty() {
        let stage = stage();
        let mut block = reporter(BlockName::OperatorsAdd).with_param("NUM1", 1.0);
        for _ in 0..10 {
            block = reporter(BlockName::OperatorsAdd).with_param("NUM1", block);
        }
        assert_eq!(Evaluator::new(&stage, "s1", 64).evaluate(&block), Value::Number(1.0));
        assert_eq!(Evaluator::new(&stage, "s1", 4).evaluate(&block), Value::Number(0.0));
    }

    #[test]
    fn stack_blocks_in_slots_evaluate_to_empty() {
        let stage = stage();
        let add = reporter(BlockName::OperatorsJoin)
            .with_param("STRING1", reporter(BlockName::MotionMoveSteps))
            .with_param("STRING2", "!");
        assert_eq!(eval(&stage, &add), Value::from("!"));
    }

    #[rstest]
    #[case(BlockName::OperatorsGt, "10", "9", true)]
    #[case(BlockName::OperatorsGt, "b", "a", true)]
    #[case(BlockName::OperatorsLt, "apple", "Banana", true)]
    #[case(BlockName::OperatorsEquals, "ABC", "abc", true)]
    #[case(BlockName::OperatorsEquals, "1.0", "1", true)]
    #[case(BlockName::OperatorsAnd, "1", "0", false)]
    #[case(BlockName::OperatorsOr, "", "a", true)]
    fn comparisons_and_logic(
        #[case] name: BlockName,
        #[case] left: &str,
        #[case] right: &str,
        #[case] expected: bool,
    ) {
        let stage = stage();
        let block = reporter(name)
            .with_param("OPERAND1", left)
            .with_param("OPERAND2", right);
        assert_eq!(eval(&stage, &block), Value::from(expected));
    }

    #[rstest]
    #[case("abs", -3.0, 3.0)]
    #[case("floor", 2.7, 2.0)]
    #[case("ceiling", 2.1, 3.0)]
    #[case("sqrt", 16.0, 4.0)]
    #[case("sin", 90.0, 1.0)]
    #[case("sin", 180.0, 0.0)]
    #[case("cos", 0.0, 1.0)]
    #[case("tan", 45.0, 1.0)]
    #[case("asin", 1.0, 90.0)]
    #[case("acos", 1.0, 0.0)]
    #[case("atan", 1.0, 45.0)]
    #[case("ln", 1.0, 0.0)]
    #[case("log", 100.0, 2.0)]
    #[case("e ^", 0.0, 1.0)]
    #[case("10 ^", 3.0, 1000.0)]
    fn math_ops(#[case] op: &str, #[case] input: f64, #[case] expected: f64) {
        let result = math_op(op, input).unwrap();
        assert_relative_eq!(result, expected, epsilon = 1e-9);
    }

    #[test]
    fn unknown_math_op_is_empty() {
        let stage = stage();
        let block = reporter(BlockName::OperatorsMathOp).with_param("OP", "cube");
        assert_eq!(eval(&stage, &block), Value::empty());
    }

    #[test]
    fn string_operators() {
        let stage = stage();
        let join = reporter(BlockName::OperatorsJoin);
        assert_eq!(eval(&stage, &join), Value::from("helloworld"));

        let letter = reporter(BlockName::OperatorsLetterOf).with_param("LETTER", 2.0);
        assert_eq!(eval(&stage, &letter), Value::from("o"));
        let past_end = reporter(BlockName::OperatorsLetterOf).with_param("LETTER", 9.0);
        assert_eq!(eval(&stage, &past_end), Value::empty());

        let length = reporter(BlockName::OperatorsLength);
        assert_eq!(eval(&stage, &length), Value::Number(5.0));

        let contains = reporter(BlockName::OperatorsContains).with_param("STRING2", "PP");
        assert_eq!(eval(&stage, &contains), Value::from(true));
    }

    #[test]
    fn random_with_equal_bounds_is_fixed() {
        let stage = stage();
        let block = reporter(BlockName::OperatorsRandom)
            .with_param("FROM", 5.0)
            .with_param("TO", 5.0);
        for _ in 0..20 {
            assert_eq!(eval(&stage, &block), Value::Number(5.0));
        }
        let swapped = reporter(BlockName::OperatorsRandom)
            .with_param("FROM", 3.0)
            .with_param("TO", 1.0);
        let n = eval(&stage, &swapped).to_number();
        assert!((1.0..=3.0).contains(&n) && n.fract() == 0.0);
    }

    #[test]
    fn mod_and_round() {
        let stage = stage();
        let modulo = reporter(BlockName::OperatorsMod)
            .with_param("NUM1", -7.0)
            .with_param("NUM2", 3.0);
        assert_eq!(eval(&stage, &modulo), Value::Number(-1.0));
        let round = reporter(BlockName::OperatorsRound).with_param("NUM", 2.5);
        assert_eq!(eval(&stage, &round), Value::Number(3.0));
    }

    #[test]
    fn sprite_and_sensing_reporters() {
        let mut stage = stage();
        stage.update_sprite("s1", |s| {
            s.x = 12.0;
            s.costume = "🦊".to_string();
        });
        stage.input.mouse = crate::block::Point::new(15.0, 0.0);
        stage.input.press("space");
        stage.set_variable(ANSWER, Value::from("Ada"));

        assert_eq!(eval(&stage, &reporter(BlockName::MotionXPosition)), Value::Number(12.0));
        assert_eq!(eval(&stage, &reporter(BlockName::MotionDirection)), Value::Number(90.0));
        assert_eq!(eval(&stage, &reporter(BlockName::LooksCostumeNumber)), Value::Number(3.0));
        assert_eq!(eval(&stage, &reporter(BlockName::SensingAnswer)), Value::from("Ada"));
        assert_eq!(eval(&stage, &reporter(BlockName::SensingMouseX)), Value::Number(15.0));
        assert_eq!(eval(&stage, &reporter(BlockName::SensingKeyPressed)), Value::from(true));
        assert_eq!(eval(&stage, &reporter(BlockName::SensingTouching)), Value::from(true));
        let edge = reporter(BlockName::SensingTouching).with_param("target", "_edge_");
        assert_eq!(eval(&stage, &edge), Value::from(false));
    }
}
