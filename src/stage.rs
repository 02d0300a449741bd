use crate::block::Point;
use crate::value::Value;
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub const STAGE_WIDTH: f64 = 480.0;
pub const STAGE_HEIGHT: f64 = 360.0;
// Half the rendered sprite width at 100% size.
pub const SPRITE_RADIUS: f64 = 20.0;

pub const COSTUMES: &[&str] = &["🐱", "🐶", "🦊", "🐻", "🐼", "🐸", "🦁", "🐯"];
pub const SOUNDS: &[&str] = &["Laser", "Warp", "Beep", "Boop"];

pub const ANSWER: &str = "answer";
pub const DEFAULT_PEN_COLOR: &str = "#ffc700";
pub const DEFAULT_PEN_SIZE: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeechStyle {
    Say,
    Think,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Speech {
    pub text: String,
    pub style: SpeechStyle,
}

impl Speech {
    pub fn say(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: SpeechStyle::Say,
        }
    }

    pub fn think(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: SpeechStyle::Think,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PenState {
    pub down: bool,
    pub color: String,
    pub size: f64,
}

impl Default for PenState {
    fn default() -> Self {
        Self {
            down: false,
            color: DEFAULT_PEN_COLOR.to_string(),
            size: DEFAULT_PEN_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpriteState {
    pub id: String,
    pub name: String,
    pub x: f64,
    pub y: f64,
    /// Degrees in `[0, 360)`; 90 points right.
    pub rotation: f64,
    pub visible: bool,
    /// An entry of `COSTUMES` or custom image data.
    pub costume: String,
    pub size: f64,
    pub volume: f64,
    pub speech: Option<Speech>,
    pub pen: PenState,
}

impl SpriteState {
    pub fn new(id: impl Into<String>, name: impl Into<String>, costume: Option<&str>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            x: 0.0,
            y: 0.0,
            rotation: 90.0,
            visible: true,
            costume: costume.unwrap_or(COSTUMES[0]).to_string(),
            size: 100.0,
            volume: 100.0,
            speech: None,
            pen: PenState::default(),
        }
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// 1-based index into `COSTUMES`. Custom costumes count as the first.
    pub fn costume_number(&self) -> usize {
        COSTUMES
            .iter()
            .position(|c| *c == self.costume)
            .map_or(1, |i| i + 1)
    }

    pub fn next_costume(&self) -> &'static str {
        let next = COSTUMES
            .iter()
            .position(|c| *c == self.costume)
            .map_or(0, |i| (i + 1) % COSTUMES.len());
        COSTUMES[next]
    }

    fn normalize(&mut self) {
        self.rotation = normalize_rotation(self.rotation);
        if !self.x.is_finite() {
            self.x = 0.0;
        }
        if !self.y.is_finite() {
            self.y = 0.0;
        }
        self.size = self.size.max(0.0);
        self.volume = self.volume.clamp(0.0, 100.0);
        self.pen.size = self.pen.size.max(1.0);
    }
}

pub fn normalize_rotation(degrees: f64) -> f64 {
    if !degrees.is_finite() {
        return 0.0;
    }
    let r = degrees.rem_euclid(360.0);
    if r >= 360.0 {
        0.0
    } else {
        r
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PenSegment {
    pub from: Point,
    pub to: Point,
    pub color: String,
    pub size: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Floor,
    Box,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThreeDObject {
    pub id: String,
    pub kind: ObjectKind,
    pub prompt: String,
    /// Image data as returned by the texture generator.
    pub texture: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AskPrompt {
    pub id: u64,
    pub question: String,
    pub sprite_id: String,
}

/// Host-written input for the sensing blocks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputState {
    pub mouse: Point,
    pub keys: HashSet<String>,
}

impl InputState {
    pub fn is_pressed(&self, key: &str) -> bool {
        if key == "any" {
            return !self.keys.is_empty();
        }
        self.keys.contains(&key.to_lowercase())
    }

    pub fn press(&mut self, key: &str) {
        self.keys.insert(key.to_lowercase());
    }

    pub fn release(&mut self, key: &str) {
        self.keys.remove(&key.to_lowercase());
    }
}

/// Everything chains read and write: sprites, variables, pen trail, 3D objects,
/// pending asks. Shared between chains as `SharedStage`.
#[derive(Debug, Clone)]
pub struct Stage {
    pub sprites: IndexMap<String, SpriteState>,
    pub variables: IndexMap<String, Value>,
    pub monitors: IndexMap<String, bool>,
    pub pen_trail: Vec<PenSegment>,
    pub objects: Vec<ThreeDObject>,
    pub asks: VecDeque<AskPrompt>,
    pub generating: usize,
    pub input: InputState,
    next_object: u64,
}

pub type SharedStage = Arc<Mutex<Stage>>;

pub fn lock(stage: &SharedStage) -> MutexGuard<'_, Stage> {
    stage.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Default for Stage {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage {
    pub fn new() -> Self {
        Self {
            sprites: IndexMap::new(),
            variables: IndexMap::from([(ANSWER.to_string(), Value::empty())]),
            monitors: IndexMap::from([(ANSWER.to_string(), false)]),
            pen_trail: Vec::new(),
            objects: Vec::new(),
            asks: VecDeque::new(),
            generating: 0,
            input: InputState::default(),
            next_object: 0,
        }
    }

    pub fn shared(self) -> SharedStage {
        Arc::new(Mutex::new(self))
    }

    pub fn sprite(&self, id: &str) -> Option<&SpriteState> {
        self.sprites.get(id)
    }

    /// Applies `change` to one sprite, then clamps its fields and records a pen
    /// segment if the pen is down and the sprite moved. Returns false for an
    /// unknown sprite.
    pub fn update_sprite(&mut self, id: &str, change: impl FnOnce(&mut SpriteState)) -> bool {
        let Some(sprite) = self.sprites.get_mut(id) else {
            return false;
        };
        let before = sprite.position();
        change(sprite);
        sprite.normalize();
        let after = sprite.position();
        if sprite.pen.down && before != after {
            self.pen_trail.push(PenSegment {
                from: before,
                to: after,
                color: sprite.pen.color.clone(),
                size: sprite.pen.size,
            });
        }
        true
    }

    pub fn variable(&self, name: &str) -> Value {
        self.variables.get(name).cloned().unwrap_or_else(Value::empty)
    }

    pub fn set_variable(&mut self, name: &str, value: Value) {
        self.variables.insert(name.to_string(), value);
    }

    /// Read-modify-write under the caller's single lock.
    pub fn change_variable(&mut self, name: &str, delta: f64) {
        let current = self.variable(name).to_number();
        self.set_variable(name, Value::Number(current + delta));
    }

    pub fn clear_speech(&mut self) {
        for sprite in self.sprites.values_mut() {
            sprite.speech = None;
        }
    }

    pub fn erase_pen(&mut self) {
        self.pen_trail.clear();
    }

    pub fn add_object(&mut self, kind: ObjectKind, prompt: &str, texture: String) -> String {
        self.next_object += 1;
        let id = format!("3d-{}", self.next_object);
        self.objects.push(ThreeDObject {
            id: id.clone(),
            kind,
            prompt: prompt.to_string(),
            texture,
        });
        id
    }

    /// Every sprite back to its initial state, keeping id, name and costume.
    pub fn reset(&mut self) {
        for sprite in self.sprites.values_mut() {
            let fresh = SpriteState::new(sprite.id.clone(), sprite.name.clone(), Some(sprite.costume.as_str()));
            *sprite = fresh;
        }
        self.pen_trail.clear();
        self.objects.clear();
    }

    pub fn current_ask(&self) -> Option<&AskPrompt> {
        self.asks.front()
    }

    pub fn snapshot(&self) -> StageSnapshot {
        let variables = self
            .variables
            .iter()
            .filter(|(name, _)| self.monitors.get(*name).copied().unwrap_or(false))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        StageSnapshot {
            sprites: self.sprites.values().cloned().collect(),
            variables,
            pen_trail: self.pen_trail.clone(),
            objects: self.objects.clone(),
            ask: self.current_ask().cloned(),
            generating: self.generating > 0,
        }
    }
}

/// Read-only view handed to a renderer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageSnapshot {
    pub sprites: Vec<SpriteState>,
    /// Only variables whose monitor is shown.
    pub variables: IndexMap<String, Value>,
    pub pen_trail: Vec<PenSegment>,
    pub objects: Vec<ThreeDObject>,
    pub ask: Option<AskPrompt>,
    pub generating: bool,
}

impl StageSnapshot {
    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn stage_with_sprite() -> Stage {
        let mut stage = Stage::new();
        stage
            .sprites
            .insert("s1".to_string(), SpriteState::new("s1", "Sprite1", None));
        stage
    }

    #[test]
    fn new_stage_has_hidden_answer_variable() {
        let stage = Stage::new();
        assert_eq!(stage.variable(ANSWER), Value::empty());
        assert_eq!(stage.monitors.get(ANSWER), Some(&false));
        assert_eq!(stage.variable("missing"), Value::empty());
    }

    #[test]
    fn rotation_is_normalised() {
        let mut stage = stage_with_sprite();
        stage.update_sprite("s1", |s| s.rotation = -90.0);
        assert_relative_eq!(stage.sprite("s1").unwrap().rotation, 270.0);
        stage.update_sprite("s1", |s| s.rotation = 725.0);
        assert_relative_eq!(stage.sprite("s1").unwrap().rotation, 5.0);
        stage.update_sprite("s1", |s| s.rotation = f64::NAN);
        assert_relative_eq!(stage.sprite("s1").unwrap().rotation, 0.0);
    }

    #[test]
    fn sizes_are_clamped() {
        let mut stage = stage_with_sprite();
        stage.update_sprite("s1", |s| {
            s.size = -5.0;
            s.volume = 150.0;
            s.pen.size = 0.0;
        });
        let sprite = stage.sprite("s1").unwrap();
        assert_eq!(sprite.size, 0.0);
        assert_eq!(sprite.volume, 100.0);
        assert_eq!(sprite.pen.size, 1.0);
    }

    #[test]
    fn pen_records_segments_only_while_down() {
        let mut stage = stage_with_sprite();
        stage.update_sprite("s1", |s| s.x = 10.0);
        assert!(stage.pen_trail.is_empty());

        stage.update_sprite("s1", |s| s.pen.down = true);
        assert!(stage.pen_trail.is_empty());
        stage.update_sprite("s1", |s| s.y = 20.0);
        assert_eq!(
            stage.pen_trail,
            vec![PenSegment {
                from: Point::new(10.0, 0.0),
                to: Point::new(10.0, 20.0),
                color: DEFAULT_PEN_COLOR.to_string(),
                size: DEFAULT_PEN_SIZE,
            }]
        );
    }

    #[test]
    fn unknown_sprite_updates_are_ignored() {
        let mut stage = Stage::new();
        assert!(!stage.update_sprite("ghost", |s| s.x = 1.0));
    }

    #[test]
    fn costume_cycle_wraps_and_custom_costumes_restart() {
        let mut sprite = SpriteState::new("s", "S", Some("🐯"));
        assert_eq!(sprite.costume_number(), 8);
        assert_eq!(sprite.next_costume(), "🐱");
        sprite.costume = "data:image/png;base64,AAAA".to_string();
        assert_eq!(sprite.costume_number(), 1);
        assert_eq!(sprite.next_costume(), "🐱");
    }

    #[test]
    fn change_variable_treats_text_as_zero() {
        let mut stage = Stage::new();
        stage.set_variable("score", Value::from("abc"));
        stage.change_variable("score", 2.0);
        assert_eq!(stage.variable("score"), Value::Number(2.0));
    }

    #[test]
    fn reset_keeps_identity_and_clears_drawings() {
        let mut stage = stage_with_sprite();
        stage.update_sprite("s1", |s| {
            s.pen.down = true;
            s.costume = "🦊".to_string();
            s.x = 50.0;
            s.rotation = 0.0;
        });
        stage.add_object(ObjectKind::Box, "a box", "data".to_string());
        stage.reset();
        let sprite = stage.sprite("s1").unwrap();
        assert_eq!(sprite.costume, "🦊");
        assert_eq!(sprite.x, 0.0);
        assert_eq!(sprite.rotation, 90.0);
        assert!(!sprite.pen.down);
        assert!(stage.pen_trail.is_empty());
        assert!(stage.objects.is_empty());
    }

    #[test]
    fn snapshot_only_shows_monitored_variables() {
        let mut stage = stage_with_sprite();
        stage.set_variable("score", Value::Number(3.0));
        stage.monitors.insert("score".to_string(), true);
        stage.set_variable("hidden", Value::Number(1.0));
        let snapshot = stage.snapshot();
        assert_eq!(snapshot.variables.len(), 1);
        assert_eq!(snapshot.variables.get("score"), Some(&Value::Number(3.0)));

        let json: serde_json::Value =
            serde_json::from_str(&snapshot.to_json().unwrap()).unwrap();
        assert_eq!(json["variables"]["score"], 3.0);
        assert_eq!(json["sprites"][0]["name"], "Sprite1");
        assert_eq!(json["generating"], false);
    }

    #[test]
    fn any_key_matches_any_pressed_key() {
        let mut input = InputState::default();
        assert!(!input.is_pressed("any"));
        input.press("A");
        assert!(input.is_pressed("a"));
        assert!(input.is_pressed("any"));
        input.release("a");
        assert!(!input.is_pressed("a"));
    }
}
