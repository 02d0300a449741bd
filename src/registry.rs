use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BlockCategory {
    Motion,
    Looks,
    Sound,
    Events,
    Control,
    Sensing,
    Operators,
    Variables,
    MyBlocks,
    Pen,
    ThreeD,
}

impl BlockCategory {
    pub fn label(self) -> &'static str {
        match self {
            BlockCategory::Motion => "Motion",
            BlockCategory::Looks => "Looks",
            BlockCategory::Sound => "Sound",
            BlockCategory::Events => "Events",
            BlockCategory::Control => "Control",
            BlockCategory::Sensing => "Sensing",
            BlockCategory::Operators => "Operators",
            BlockCategory::Variables => "Variables",
            BlockCategory::MyBlocks => "My Blocks",
            BlockCategory::Pen => "Pen",
            BlockCategory::ThreeD => "3D",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockShape {
    Hat,
    Stack,
    Reporter,
    CBlock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BlockName {
    MotionMoveSteps,
    MotionTurnCw,
    MotionTurnCcw,
    MotionGotoXy,
    MotionGoto,
    MotionPointTowards,
    MotionChangeXBy,
    MotionSetX,
    MotionChangeYBy,
    MotionSetY,
    MotionIfOnEdgeBounce,
    MotionXPosition,
    MotionYPosition,
    MotionDirection,
    LooksSayForSecs,
    LooksSay,
    LooksThinkForSecs,
    LooksThink,
    LooksSwitchCostume,
    LooksNextCostume,
    LooksChangeSizeBy,
    LooksSetSize,
    LooksShow,
    LooksHide,
    LooksCostumeNumber,
    LooksSize,
    SoundPlay,
    SoundPlayUntilDone,
    SoundStopAll,
    SoundChangeVolumeBy,
    SoundSetVolume,
    SoundVolume,
    EventsWhenFlagClicked,
    EventsWhenSpriteClicked,
    EventsBroadcast,
    EventsWhenIReceive,
    ControlWait,
    ControlRepeat,
    ControlForever,
    ControlIf,
    ControlWaitUntil,
    SensingAskAndWait,
    SensingAnswer,
    SensingTouching,
    SensingMouseX,
    SensingMouseY,
    SensingKeyPressed,
    OperatorsAdd,
    OperatorsSubtract,
    OperatorsMultiply,
    OperatorsDivide,
    OperatorsRandom,
    OperatorsGt,
    OperatorsLt,
    OperatorsEquals,
    OperatorsAnd,
    OperatorsOr,
    OperatorsNot,
    OperatorsJoin,
    OperatorsLetterOf,
    OperatorsLength,
    OperatorsContains,
    OperatorsMod,
    OperatorsRound,
    OperatorsMathOp,
    VariablesSet,
    VariablesChange,
    VariablesReporter,
    MyblocksDefine,
    MyblocksRun,
    PenEraseAll,
    PenDown,
    PenUp,
    PenSetColor,
    PenSetSize,
    ThreedCreateObject,
}

impl BlockName {
    pub fn as_str(self) -> &'static str {
        match self {
            BlockName::MotionMoveSteps => "MOTION_MOVE_STEPS",
            BlockName::MotionTurnCw => "MOTION_TURN_CW",
            BlockName::MotionTurnCcw => "MOTION_TURN_CCW",
            BlockName::MotionGotoXy => "MOTION_GOTO_XY",
            BlockName::MotionGoto => "MOTION_GOTO",
            BlockName::MotionPointTowards => "MOTION_POINT_TOWARDS",
            BlockName::MotionChangeXBy => "MOTION_CHANGE_X_BY",
            BlockName::MotionSetX => "MOTION_SET_X",
            BlockName::MotionChangeYBy => "MOTION_CHANGE_Y_BY",
            BlockName::MotionSetY => "MOTION_SET_Y",
            BlockName::MotionIfOnEdgeBounce => "MOTION_IF_ON_EDGE_BOUNCE",
            BlockName::MotionXPosition => "MOTION_X_POSITION",
            BlockName::MotionYPosition => "MOTION_Y_POSITION",
            BlockName::MotionDirection => "MOTION_DIRECTION",
            BlockName::LooksSayForSecs => "LOOKS_SAY_FOR_SECS",
            BlockName::LooksSay => "LOOKS_SAY",
            BlockName::LooksThinkForSecs => "LOOKS_THINK_FOR_SECS",
            BlockName::LooksThink => "LOOKS_THINK",
            BlockName::LooksSwitchCostume => "LOOKS_SWITCH_COSTUME",
            BlockName::LooksNextCostume => "LOOKS_NEXT_COSTUME",
            BlockName::LooksChangeSizeBy => "LOOKS_CHANGE_SIZE_BY",
            BlockName::LooksSetSize => "LOOKS_SET_SIZE",
            BlockName::LooksShow => "LOOKS_SHOW",
            BlockName::LooksHide => "LOOKS_HIDE",
            BlockName::LooksCostumeNumber => "LOOKS_COSTUME_NUMBER",
            BlockName::LooksSize => "LOOKS_SIZE",
            BlockName::SoundPlay => "SOUND_PLAY",
            BlockName::SoundPlayUntilDone => "SOUND_PLAY_UNTIL_DONE",
            BlockName::SoundStopAll => "SOUND_STOP_ALL",
            BlockName::SoundChangeVolumeBy => "SOUND_CHANGE_VOLUME_BY",
            BlockName::SoundSetVolume => "SOUND_SET_VOLUME",
            BlockName::SoundVolume => "SOUND_VOLUME",
            BlockName::EventsWhenFlagClicked => "EVENTS_WHEN_FLAG_CLICKED",
            BlockName::EventsWhenSpriteClicked => "EVENTS_WHEN_SPRITE_CLICKED",
            BlockName::EventsBroadcast => "EVENTS_BROADCAST",
            BlockName::EventsWhenIReceive => "EVENTS_WHEN_I_RECEIVE",
            BlockName::ControlWait => "CONTROL_WAIT",
            BlockName::ControlRepeat => "CONTROL_REPEAT",
            BlockName::ControlForever => "CONTROL_FOREVER",
            BlockName::ControlIf => "CONTROL_IF",
            BlockName::ControlWaitUntil => "CONTROL_WAIT_UNTIL",
            BlockName::SensingAskAndWait => "SENSING_ASK_AND_WAIT",
            BlockName::SensingAnswer => "SENSING_ANSWER",
            BlockName::SensingTouching => "SENSING_TOUCHING",
            BlockName::SensingMouseX => "SENSING_MOUSE_X",
            BlockName::SensingMouseY => "SENSING_MOUSE_Y",
            BlockName::SensingKeyPressed => "SENSING_KEY_PRESSED",
            BlockName::OperatorsAdd => "OPERATORS_ADD",
            BlockName::OperatorsSubtract => "OPERATORS_SUBTRACT",
            BlockName::OperatorsMultiply => "OPERATORS_MULTIPLY",
            BlockName::OperatorsDivide => "OPERATORS_DIVIDE",
            BlockName::OperatorsRandom => "OPERATORS_RANDOM",
            BlockName::OperatorsGt => "OPERATORS_GT",
            BlockName::OperatorsLt => "OPERATORS_LT",
            BlockName::OperatorsEquals => "OPERATORS_EQUALS",
            BlockName::OperatorsAnd => "OPERATORS_AND",
            BlockName::OperatorsOr => "OPERATORS_OR",
            BlockName::OperatorsNot => "OPERATORS_NOT",
            BlockName::OperatorsJoin => "OPERATORS_JOIN",
            BlockName::OperatorsLetterOf => "OPERATORS_LETTER_OF",
            BlockName::OperatorsLength => "OPERATORS_LENGTH",
            BlockName::OperatorsContains => "OPERATORS_CONTAINS",
            BlockName::OperatorsMod => "OPERATORS_MOD",
            BlockName::OperatorsRound => "OPERATORS_ROUND",
            BlockName::OperatorsMathOp => "OPERATORS_MATH_OP",
            BlockName::VariablesSet => "VARIABLES_SET",
            BlockName::VariablesChange => "VARIABLES_CHANGE",
            BlockName::VariablesReporter => "VARIABLES_REPORTER",
            BlockName::MyblocksDefine => "MYBLOCKS_DEFINE",
            BlockName::MyblocksRun => "MYBLOCKS_RUN",
            BlockName::PenEraseAll => "PEN_ERASE_ALL",
            BlockName::PenDown => "PEN_DOWN",
            BlockName::PenUp => "PEN_UP",
            BlockName::PenSetColor => "PEN_SET_COLOR",
            BlockName::PenSetSize => "PEN_SET_SIZE",
            BlockName::ThreedCreateObject => "THREED_CREATE_OBJECT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    Number,
    Text,
    VariableDropdown,
    ScriptDropdown,
    CostumeDropdown,
    SoundDropdown,
    Color,
    Dropdown,
}

/// Template-level default. Kept `const`-constructible so the catalog can live in statics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Literal {
    Number(f64),
    Text(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamDef {
    pub name: &'static str,
    pub kind: ParamKind,
    pub default: Literal,
    pub options: &'static [&'static str],
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockTemplate {
    pub name: BlockName,
    pub category: BlockCategory,
    pub shape: BlockShape,
    pub label: &'static str,
    pub params: &'static [ParamDef],
    /// Bindings applied when the block is placed. Parameters absent here start unbound.
    pub defaults: &'static [(&'static str, Literal)],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelPart<'a> {
    Text(&'a str),
    Slot(&'a str),
}

impl BlockTemplate {
    pub fn param_def(&self, name: &str) -> Option<&ParamDef> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn label_parts(&self) -> Vec<LabelPart<'static>> {
        let mut parts = Vec::new();
        let mut rest = self.label;
        while let Some(open) = rest.find('{') {
            let Some(close_offset) = rest[open..].find('}') else {
                break;
            };
            let close = open + close_offset;
            if open > 0 {
                parts.push(LabelPart::Text(&rest[..open]));
            }
            parts.push(LabelPart::Slot(&rest[open + 1..close]));
            rest = &rest[close + 1..];
        }
        if !rest.is_empty() {
            parts.push(LabelPart::Text(rest));
        }
        parts
    }
}

pub struct Extension {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub category: BlockCategory,
    pub blocks: &'static [BlockTemplate],
}

const fn number(name: &'static str, default: f64) -> ParamDef {
    ParamDef {
        name,
        kind: ParamKind::Number,
        default: Literal::Number(default),
        options: &[],
    }
}

const fn blank_number(name: &'static str) -> ParamDef {
    ParamDef {
        name,
        kind: ParamKind::Number,
        default: Literal::Text(""),
        options: &[],
    }
}

const fn text(name: &'static str, default: &'static str) -> ParamDef {
    ParamDef {
        name,
        kind: ParamKind::Text,
        default: Literal::Text(default),
        options: &[],
    }
}

const fn picker(name: &'static str, kind: ParamKind, default: &'static str) -> ParamDef {
    ParamDef {
        name,
        kind,
        default: Literal::Text(default),
        options: &[],
    }
}

const fn dropdown(
    name: &'static str,
    default: &'static str,
    options: &'static [&'static str],
) -> ParamDef {
    ParamDef {
        name,
        kind: ParamKind::Dropdown,
        default: Literal::Text(default),
        options,
    }
}

const fn plain(
    name: BlockName,
    category: BlockCategory,
    shape: BlockShape,
    label: &'static str,
) -> BlockTemplate {
    BlockTemplate {
        name,
        category,
        shape,
        label,
        params: &[],
        defaults: &[],
    }
}

const NUM: Literal = Literal::Text("");

pub const KEYS: &[&str] = &[
    "space", "up arrow", "down arrow", "right arrow", "left arrow", "any", "a", "b", "c", "d",
    "e", "f", "g", "h", "i", "j", "k", "l", "m", "n", "o", "p", "q", "r", "s", "t", "u", "v",
    "w", "x", "y", "z", "0", "1", "2", "3", "4", "5", "6", "7", "8", "9",
];

pub const MATH_OPS: &[&str] = &[
    "abs", "floor", "ceiling", "sqrt", "sin", "cos", "tan", "asin", "acos", "atan", "ln", "log",
    "e ^", "10 ^",
];

use BlockCategory as C;
use BlockName as N;
use BlockShape as S;

pub static MOTION_BLOCKS: &[BlockTemplate] = &[
    BlockTemplate {
        params: &[number("steps", 10.0)],
        defaults: &[("steps", Literal::Number(10.0))],
        ..plain(N::MotionMoveSteps, C::Motion, S::Stack, "move {steps} steps")
    },
    BlockTemplate {
        params: &[number("degrees", 15.0)],
        defaults: &[("degrees", Literal::Number(15.0))],
        ..plain(N::MotionTurnCw, C::Motion, S::Stack, "turn ↻ {degrees} degrees")
    },
    BlockTemplate {
        params: &[number("degrees", 15.0)],
        defaults: &[("degrees", Literal::Number(15.0))],
        ..plain(N::MotionTurnCcw, C::Motion, S::Stack, "turn ↺ {degrees} degrees")
    },
    BlockTemplate {
        params: &[dropdown("target", "_random_", &["_random_", "_mouse_"])],
        defaults: &[("target", Literal::Text("_random_"))],
        ..plain(N::MotionGoto, C::Motion, S::Stack, "go to {target}")
    },
    BlockTemplate {
        params: &[number("x", 0.0), number("y", 0.0)],
        defaults: &[("x", Literal::Number(0.0)), ("y", Literal::Number(0.0))],
        ..plain(N::MotionGotoXy, C::Motion, S::Stack, "go to x: {x} y: {y}")
    },
    BlockTemplate {
        params: &[dropdown("target", "_mouse_", &["_mouse_"])],
        defaults: &[("target", Literal::Text("_mouse_"))],
        ..plain(N::MotionPointTowards, C::Motion, S::Stack, "point towards {target}")
    },
    BlockTemplate {
        params: &[number("dx", 10.0)],
        defaults: &[("dx", Literal::Number(10.0))],
        ..plain(N::MotionChangeXBy, C::Motion, S::Stack, "change x by {dx}")
    },
    BlockTemplate {
        params: &[number("x", 0.0)],
        defaults: &[("x", Literal::Number(0.0))],
        ..plain(N::MotionSetX, C::Motion, S::Stack, "set x to {x}")
    },
    BlockTemplate {
        params: &[number("dy", 10.0)],
        defaults: &[("dy", Literal::Number(10.0))],
        ..plain(N::MotionChangeYBy, C::Motion, S::Stack, "change y by {dy}")
    },
    BlockTemplate {
        params: &[number("y", 0.0)],
        defaults: &[("y", Literal::Number(0.0))],
        ..plain(N::MotionSetY, C::Motion, S::Stack, "set y to {y}")
    },
    plain(N::MotionIfOnEdgeBounce, C::Motion, S::Stack, "if on edge, bounce"),
    plain(N::MotionXPosition, C::Motion, S::Reporter, "x position"),
    plain(N::MotionYPosition, C::Motion, S::Reporter, "y position"),
    plain(N::MotionDirection, C::Motion, S::Reporter, "direction"),
];

pub static LOOKS_BLOCKS: &[BlockTemplate] = &[
    BlockTemplate {
        params: &[text("message", "Hello!"), number("seconds", 2.0)],
        defaults: &[
            ("message", Literal::Text("Hello!")),
            ("seconds", Literal::Number(2.0)),
        ],
        ..plain(
            N::LooksSayForSecs,
            C::Looks,
            S::Stack,
            "say {message} for {seconds} seconds",
        )
    },
    BlockTemplate {
        params: &[text("message", "Hello!")],
        defaults: &[("message", Literal::Text("Hello!"))],
        ..plain(N::LooksSay, C::Looks, S::Stack, "say {message}")
    },
    BlockTemplate {
        params: &[text("message", "Hmm..."), number("seconds", 2.0)],
        defaults: &[
            ("message", Literal::Text("Hmm...")),
            ("seconds", Literal::Number(2.0)),
        ],
        ..plain(
            N::LooksThinkForSecs,
            C::Looks,
            S::Stack,
            "think {message} for {seconds} seconds",
        )
    },
    BlockTemplate {
        params: &[text("message", "Hmm...")],
        defaults: &[("message", Literal::Text("Hmm..."))],
        ..plain(N::LooksThink, C::Looks, S::Stack, "think {message}")
    },
    BlockTemplate {
        params: &[picker("costume", ParamKind::CostumeDropdown, "🐱")],
        defaults: &[("costume", Literal::Text("🐱"))],
        ..plain(
            N::LooksSwitchCostume,
            C::Looks,
            S::Stack,
            "switch costume to {costume}",
        )
    },
    plain(N::LooksNextCostume, C::Looks, S::Stack, "next costume"),
    BlockTemplate {
        params: &[number("size", 10.0)],
        defaults: &[("size", Literal::Number(10.0))],
        ..plain(N::LooksChangeSizeBy, C::Looks, S::Stack, "change size by {size}")
    },
    BlockTemplate {
        params: &[number("size", 100.0)],
        defaults: &[("size", Literal::Number(100.0))],
        ..plain(N::LooksSetSize, C::Looks, S::Stack, "set size to {size}%")
    },
    plain(N::LooksShow, C::Looks, S::Stack, "show"),
    plain(N::LooksHide, C::Looks, S::Stack, "hide"),
    plain(N::LooksCostumeNumber, C::Looks, S::Reporter, "costume #"),
    plain(N::LooksSize, C::Looks, S::Reporter, "size"),
];

pub static SOUND_BLOCKS: &[BlockTemplate] = &[
    BlockTemplate {
        params: &[picker("sound", ParamKind::SoundDropdown, "Laser")],
        defaults: &[("sound", Literal::Text("Laser"))],
        ..plain(N::SoundPlay, C::Sound, S::Stack, "play sound {sound}")
    },
    BlockTemplate {
        params: &[picker("sound", ParamKind::SoundDropdown, "Laser")],
        defaults: &[("sound", Literal::Text("Laser"))],
        ..plain(
            N::SoundPlayUntilDone,
            C::Sound,
            S::Stack,
            "play sound {sound} until done",
        )
    },
    plain(N::SoundStopAll, C::Sound, S::Stack, "stop all sounds"),
    BlockTemplate {
        params: &[number("volume", -10.0)],
        defaults: &[("volume", Literal::Number(-10.0))],
        ..plain(
            N::SoundChangeVolumeBy,
            C::Sound,
            S::Stack,
            "change volume by {volume}",
        )
    },
    BlockTemplate {
        params: &[number("volume", 100.0)],
        defaults: &[("volume", Literal::Number(100.0))],
        ..plain(N::SoundSetVolume, C::Sound, S::Stack, "set volume to {volume}%")
    },
    plain(N::SoundVolume, C::Sound, S::Reporter, "volume"),
];

pub static EVENTS_BLOCKS: &[BlockTemplate] = &[
    plain(N::EventsWhenFlagClicked, C::Events, S::Hat, "when 🏁 clicked"),
    plain(
        N::EventsWhenSpriteClicked,
        C::Events,
        S::Hat,
        "when this sprite clicked",
    ),
    BlockTemplate {
        params: &[text("message", "message1")],
        defaults: &[("message", Literal::Text("message1"))],
        ..plain(N::EventsBroadcast, C::Events, S::Stack, "broadcast {message}")
    },
    BlockTemplate {
        params: &[text("message", "message1")],
        defaults: &[("message", Literal::Text("message1"))],
        ..plain(N::EventsWhenIReceive, C::Events, S::Hat, "when I receive {message}")
    },
];

pub static CONTROL_BLOCKS: &[BlockTemplate] = &[
    BlockTemplate {
        params: &[number("seconds", 1.0)],
        defaults: &[("seconds", Literal::Number(1.0))],
        ..plain(N::ControlWait, C::Control, S::Stack, "wait {seconds} seconds")
    },
    BlockTemplate {
        params: &[number("times", 10.0)],
        defaults: &[("times", Literal::Number(10.0))],
        ..plain(N::ControlRepeat, C::Control, S::CBlock, "repeat {times}")
    },
    plain(N::ControlForever, C::Control, S::CBlock, "forever"),
    BlockTemplate {
        params: &[text("condition", "")],
        ..plain(N::ControlIf, C::Control, S::CBlock, "if {condition} then")
    },
    BlockTemplate {
        params: &[text("condition", "")],
        ..plain(N::ControlWaitUntil, C::Control, S::Stack, "wait until {condition}")
    },
];

pub static SENSING_BLOCKS: &[BlockTemplate] = &[
    BlockTemplate {
        params: &[text("question", "What's your name?")],
        defaults: &[("question", Literal::Text("What's your name?"))],
        ..plain(
            N::SensingAskAndWait,
            C::Sensing,
            S::Stack,
            "ask {question} and wait",
        )
    },
    BlockTemplate {
        params: &[dropdown("target", "_mouse_", &["_mouse_", "_edge_"])],
        defaults: &[("target", Literal::Text("_mouse_"))],
        ..plain(N::SensingTouching, C::Sensing, S::Reporter, "touching {target}?")
    },
    BlockTemplate {
        params: &[dropdown("key", "space", KEYS)],
        defaults: &[("key", Literal::Text("space"))],
        ..plain(N::SensingKeyPressed, C::Sensing, S::Reporter, "key {key} pressed?")
    },
    plain(N::SensingAnswer, C::Sensing, S::Reporter, "answer"),
    plain(N::SensingMouseX, C::Sensing, S::Reporter, "mouse x"),
    plain(N::SensingMouseY, C::Sensing, S::Reporter, "mouse y"),
];

pub static OPERATORS_BLOCKS: &[BlockTemplate] = &[
    BlockTemplate {
        params: &[blank_number("NUM1"), blank_number("NUM2")],
        defaults: &[("NUM1", NUM), ("NUM2", NUM)],
        ..plain(N::OperatorsAdd, C::Operators, S::Reporter, "{NUM1} + {NUM2}")
    },
    BlockTemplate {
        params: &[blank_number("NUM1"), blank_number("NUM2")],
        defaults: &[("NUM1", NUM), ("NUM2", NUM)],
        ..plain(N::OperatorsSubtract, C::Operators, S::Reporter, "{NUM1} - {NUM2}")
    },
    BlockTemplate {
        params: &[blank_number("NUM1"), blank_number("NUM2")],
        defaults: &[("NUM1", NUM), ("NUM2", NUM)],
        ..plain(N::OperatorsMultiply, C::Operators, S::Reporter, "{NUM1} * {NUM2}")
    },
    BlockTemplate {
        params: &[blank_number("NUM1"), blank_number("NUM2")],
        defaults: &[("NUM1", NUM), ("NUM2", NUM)],
        ..plain(N::OperatorsDivide, C::Operators, S::Reporter, "{NUM1} / {NUM2}")
    },
    BlockTemplate {
        params: &[number("FROM", 1.0), number("TO", 10.0)],
        defaults: &[("FROM", Literal::Number(1.0)), ("TO", Literal::Number(10.0))],
        ..plain(
            N::OperatorsRandom,
            C::Operators,
            S::Reporter,
            "pick random from {FROM} to {TO}",
        )
    },
    BlockTemplate {
        params: &[text("OPERAND1", ""), text("OPERAND2", "50")],
        defaults: &[
            ("OPERAND1", Literal::Text("")),
            ("OPERAND2", Literal::Text("50")),
        ],
        ..plain(
            N::OperatorsGt,
            C::Operators,
            S::Reporter,
            "{OPERAND1} > {OPERAND2}",
        )
    },
    BlockTemplate {
        params: &[text("OPERAND1", ""), text("OPERAND2", "50")],
        defaults: &[
            ("OPERAND1", Literal::Text("")),
            ("OPERAND2", Literal::Text("50")),
        ],
        ..plain(
            N::OperatorsLt,
            C::Operators,
            S::Reporter,
            "{OPERAND1} < {OPERAND2}",
        )
    },
    BlockTemplate {
        params: &[text("OPERAND1", ""), text("OPERAND2", "50")],
        defaults: &[
            ("OPERAND1", Literal::Text("")),
            ("OPERAND2", Literal::Text("50")),
        ],
        ..plain(
            N::OperatorsEquals,
            C::Operators,
            S::Reporter,
            "{OPERAND1} = {OPERAND2}",
        )
    },
    BlockTemplate {
        params: &[text("OPERAND1", ""), text("OPERAND2", "")],
        defaults: &[
            ("OPERAND1", Literal::Text("")),
            ("OPERAND2", Literal::Text("")),
        ],
        ..plain(
            N::OperatorsAnd,
            C::Operators,
            S::Reporter,
            "{OPERAND1} and {OPERAND2}",
        )
    },
    BlockTemplate {
        params: &[text("OPERAND1", ""), text("OPERAND2", "")],
        defaults: &[
            ("OPERAND1", Literal::Text("")),
            ("OPERAND2", Literal::Text("")),
        ],
        ..plain(
            N::OperatorsOr,
            C::Operators,
            S::Reporter,
            "{OPERAND1} or {OPERAND2}",
        )
    },
    BlockTemplate {
        params: &[text("OPERAND", "")],
        defaults: &[("OPERAND", Literal::Text(""))],
        ..plain(N::OperatorsNot, C::Operators, S::Reporter, "not {OPERAND}")
    },
    BlockTemplate {
        params: &[text("STRING1", "hello"), text("STRING2", "world")],
        defaults: &[
            ("STRING1", Literal::Text("hello")),
            ("STRING2", Literal::Text("world")),
        ],
        ..plain(
            N::OperatorsJoin,
            C::Operators,
            S::Reporter,
            "join {STRING1} {STRING2}",
        )
    },
    BlockTemplate {
        params: &[number("LETTER", 1.0), text("STRING", "world")],
        defaults: &[
            ("LETTER", Literal::Number(1.0)),
            ("STRING", Literal::Text("world")),
        ],
        ..plain(
            N::OperatorsLetterOf,
            C::Operators,
            S::Reporter,
            "letter {LETTER} of {STRING}",
        )
    },
    BlockTemplate {
        params: &[text("STRING", "apple")],
        defaults: &[("STRING", Literal::Text("apple"))],
        ..plain(N::OperatorsLength, C::Operators, S::Reporter, "length of {STRING}")
    },
    BlockTemplate {
        params: &[text("STRING1", "apple"), text("STRING2", "a")],
        defaults: &[
            ("STRING1", Literal::Text("apple")),
            ("STRING2", Literal::Text("a")),
        ],
        ..plain(
            N::OperatorsContains,
            C::Operators,
            S::Reporter,
            "{STRING1} contains {STRING2}?",
        )
    },
    BlockTemplate {
        params: &[blank_number("NUM1"), blank_number("NUM2")],
        defaults: &[("NUM1", NUM), ("NUM2", NUM)],
        ..plain(N::OperatorsMod, C::Operators, S::Reporter, "{NUM1} mod {NUM2}")
    },
    BlockTemplate {
        params: &[blank_number("NUM")],
        defaults: &[("NUM", NUM)],
        ..plain(N::OperatorsRound, C::Operators, S::Reporter, "round {NUM}")
    },
    BlockTemplate {
        params: &[
            dropdown("OP", "abs", MATH_OPS),
            ParamDef {
                default: Literal::Text("10"),
                ..blank_number("NUM")
            },
        ],
        defaults: &[("OP", Literal::Text("abs")), ("NUM", Literal::Text("10"))],
        ..plain(N::OperatorsMathOp, C::Operators, S::Reporter, "{OP} of {NUM}")
    },
];

pub static VARIABLE_BLOCKS: &[BlockTemplate] = &[
    BlockTemplate {
        params: &[
            picker("variable", ParamKind::VariableDropdown, ""),
            text("value", "0"),
        ],
        defaults: &[("value", Literal::Text("0"))],
        ..plain(
            N::VariablesSet,
            C::Variables,
            S::Stack,
            "set {variable} to {value}",
        )
    },
    BlockTemplate {
        params: &[
            picker("variable", ParamKind::VariableDropdown, ""),
            number("value", 1.0),
        ],
        defaults: &[("value", Literal::Number(1.0))],
        ..plain(
            N::VariablesChange,
            C::Variables,
            S::Stack,
            "change {variable} by {value}",
        )
    },
    BlockTemplate {
        params: &[picker("variable", ParamKind::VariableDropdown, "")],
        ..plain(N::VariablesReporter, C::Variables, S::Reporter, "{variable}")
    },
];

pub static MY_BLOCKS: &[BlockTemplate] = &[
    BlockTemplate {
        params: &[text("name", "script1")],
        defaults: &[("name", Literal::Text("script1"))],
        ..plain(
            N::MyblocksDefine,
            C::MyBlocks,
            S::CBlock,
            "create script called {name}",
        )
    },
    BlockTemplate {
        params: &[picker("name", ParamKind::ScriptDropdown, "")],
        ..plain(N::MyblocksRun, C::MyBlocks, S::Stack, "run script {name}")
    },
];

pub static PEN_BLOCKS: &[BlockTemplate] = &[
    plain(N::PenEraseAll, C::Pen, S::Stack, "erase all"),
    plain(N::PenDown, C::Pen, S::Stack, "pen down"),
    plain(N::PenUp, C::Pen, S::Stack, "pen up"),
    BlockTemplate {
        params: &[picker("color", ParamKind::Color, "#ffc700")],
        defaults: &[("color", Literal::Text("#ffc700"))],
        ..plain(N::PenSetColor, C::Pen, S::Stack, "set pen color to {color}")
    },
    BlockTemplate {
        params: &[number("size", 10.0)],
        defaults: &[("size", Literal::Number(10.0))],
        ..plain(N::PenSetSize, C::Pen, S::Stack, "set pen size to {size}")
    },
];

pub static THREED_BLOCKS: &[BlockTemplate] = &[BlockTemplate {
    params: &[text("object", "a floor with grass texture")],
    defaults: &[("object", Literal::Text("a floor with grass texture"))],
    ..plain(N::ThreedCreateObject, C::ThreeD, S::Stack, "Make {object}")
}];

pub static EXTENSIONS: &[Extension] = &[
    Extension {
        id: "pen",
        name: "Pen",
        description: "Draw with your sprites.",
        category: C::Pen,
        blocks: PEN_BLOCKS,
    },
    Extension {
        id: "3d",
        name: "3D",
        description: "Create 3D objects with AI.",
        category: C::ThreeD,
        blocks: THREED_BLOCKS,
    },
];

static CORE_GROUPS: &[(BlockCategory, &[BlockTemplate])] = &[
    (C::Motion, MOTION_BLOCKS),
    (C::Looks, LOOKS_BLOCKS),
    (C::Sound, SOUND_BLOCKS),
    (C::Events, EVENTS_BLOCKS),
    (C::Control, CONTROL_BLOCKS),
    (C::Sensing, SENSING_BLOCKS),
    (C::Operators, OPERATORS_BLOCKS),
    (C::Variables, VARIABLE_BLOCKS),
    (C::MyBlocks, MY_BLOCKS),
];

pub fn all_templates() -> impl Iterator<Item = &'static BlockTemplate> {
    CORE_GROUPS
        .iter()
        .flat_map(|(_, blocks)| blocks.iter())
        .chain(EXTENSIONS.iter().flat_map(|ext| ext.blocks.iter()))
}

pub fn find_template(name: BlockName) -> Option<&'static BlockTemplate> {
    all_templates().find(|t| t.name == name)
}

pub fn find_extension(id: &str) -> Option<&'static Extension> {
    EXTENSIONS.iter().find(|ext| ext.id == id)
}

/// Palette groups in display order: core categories, then each enabled extension.
/// Unknown extension ids are skipped.
pub fn palette(enabled_extensions: &[&str]) -> Vec<(BlockCategory, &'static [BlockTemplate])> {
    let mut groups = CORE_GROUPS.to_vec();
    for id in enabled_extensions {
        if let Some(ext) = find_extension(id) {
            if !groups.iter().any(|(category, _)| *category == ext.category) {
                groups.push((ext.category, ext.blocks));
            }
        }
    }
    groups
}
