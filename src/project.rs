use crate::block::{BlockId, ParamValue, Point};
use crate::registry::{self, BlockCategory, BlockName, BlockTemplate, ParamKind};
use crate::script::Script;
use crate::stage::{self, SharedStage, SpriteState, Stage, ANSWER, COSTUMES, SOUNDS};
use crate::value::Value;
use anyhow::{anyhow, bail, Result};
use indexmap::IndexMap;
use log::{debug, info};

/// The editable program: sprites (in the shared stage), one script per sprite,
/// and the enabled extensions.
pub struct Project {
    stage: SharedStage,
    scripts: IndexMap<String, Script>,
    extensions: Vec<&'static str>,
    next_sprite: u64,
}

impl Default for Project {
    fn default() -> Self {
        Self::new()
    }
}

impl Project {
    /// A project with a single default sprite.
    pub fn new() -> Self {
        let mut project = Self::empty();
        project.add_sprite();
        project
    }

    pub fn empty() -> Self {
        Self {
            stage: Stage::new().shared(),
            scripts: IndexMap::new(),
            extensions: Vec::new(),
            next_sprite: 0,
        }
    }

    pub fn stage(&self) -> &SharedStage {
        &self.stage
    }

    pub fn sprite_ids(&self) -> Vec<String> {
        self.scripts.keys().cloned().collect()
    }

    pub fn scripts(&self) -> &IndexMap<String, Script> {
        &self.scripts
    }

    pub fn script(&self, sprite_id: &str) -> Option<&Script> {
        self.scripts.get(sprite_id)
    }

    pub fn script_mut(&mut self, sprite_id: &str) -> Result<&mut Script> {
        self.scripts
            .get_mut(sprite_id)
            .ok_or_else(|| anyhow!("unknown sprite '{}'", sprite_id))
    }

    /// Adds a sprite wearing the next costume in the default cycle.
    pub fn add_sprite(&mut self) -> String {
        let count = self.scripts.len();
        self.insert_sprite(COSTUMES[count % COSTUMES.len()])
    }

    /// Adds a sprite wearing custom image data.
    pub fn add_sprite_with_costume(&mut self, costume: &str) -> String {
        self.insert_sprite(costume)
    }

    fn insert_sprite(&mut self, costume: &str) -> String {
        self.next_sprite += 1;
        let id = format!("sprite-{}", self.next_sprite);
        let name = format!("Sprite{}", self.scripts.len() + 1);
        stage::lock(&self.stage)
            .sprites
            .insert(id.clone(), SpriteState::new(id.clone(), name.clone(), Some(costume)));
        self.scripts.insert(id.clone(), Script::new());
        info!("added {} ({})", name, id);
        id
    }

    pub fn delete_sprite(&mut self, sprite_id: &str) -> Result<()> {
        if self.scripts.shift_remove(sprite_id).is_none() {
            bail!("unknown sprite '{}'", sprite_id);
        }
        stage::lock(&self.stage).sprites.shift_remove(sprite_id);
        info!("deleted sprite {}", sprite_id);
        Ok(())
    }

    /// Sprite editor changes. They go through the same clamping and pen
    /// recording as interpreter moves.
    pub fn edit_sprite(&self, sprite_id: &str, change: impl FnOnce(&mut SpriteState)) -> Result<()> {
        if !stage::lock(&self.stage).update_sprite(sprite_id, change) {
            bail!("unknown sprite '{}'", sprite_id);
        }
        Ok(())
    }

    pub fn reset_stage(&self) {
        stage::lock(&self.stage).reset();
    }

    /// Places a new block from the palette, binding pickers to the first
    /// available variable, defined script, costume or sound.
    pub fn place_block(&mut self, sprite_id: &str, name: BlockName, drop_at: Point) -> Result<BlockId> {
        let template = registry::find_template(name)
            .ok_or_else(|| anyhow!("no template for {}", name.as_str()))?;
        let overrides = self.placement_defaults(template);
        let script = self.script_mut(sprite_id)?;
        Ok(script.place_with(template, drop_at, overrides).id.clone())
    }

    fn placement_defaults(&self, template: &BlockTemplate) -> IndexMap<String, ParamValue> {
        let mut overrides = IndexMap::new();
        for param in template.params {
            let value = match param.kind {
                ParamKind::VariableDropdown if template.category == BlockCategory::Variables => {
                    self.variable_names().into_iter().next()
                }
                ParamKind::ScriptDropdown => self.defined_scripts().into_iter().next(),
                ParamKind::CostumeDropdown => COSTUMES.first().map(|c| c.to_string()),
                ParamKind::SoundDropdown => SOUNDS.first().map(|s| s.to_string()),
                _ => None,
            };
            if let Some(value) = value {
                overrides.insert(param.name.to_string(), ParamValue::from(value));
            }
        }
        overrides
    }

    /// User-created variables in creation order. `answer` is not listed.
    pub fn variable_names(&self) -> Vec<String> {
        stage::lock(&self.stage)
            .variables
            .keys()
            .filter(|name| name.as_str() != ANSWER)
            .cloned()
            .collect()
    }

    pub fn create_variable(&mut self, name: &str) -> Result<String> {
        let name = name.trim();
        if name.is_empty() {
            bail!("variable name is empty");
        }
        if name.eq_ignore_ascii_case(ANSWER) {
            bail!("'{}' is a reserved variable name", ANSWER);
        }
        let mut stage = stage::lock(&self.stage);
        if stage.variables.contains_key(name) {
            bail!("a variable named '{}' already exists", name);
        }
        stage.set_variable(name, Value::Number(0.0));
        stage.monitors.insert(name.to_string(), false);
        debug!("created variable {}", name);
        Ok(name.to_string())
    }

    /// Flips the monitor for `name` and returns the new visibility.
    pub fn toggle_monitor(&self, name: &str) -> bool {
        let mut stage = stage::lock(&self.stage);
        let shown = stage.monitors.entry(name.to_string()).or_insert(false);
        *shown = !*shown;
        *shown
    }

    /// Distinct, non-blank names of every `create script called` block, in
    /// sprite then placement order.
    pub fn defined_scripts(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for script in self.scripts.values() {
            for block in script.blocks() {
                if block.name() != BlockName::MyblocksDefine {
                    continue;
                }
                if let Some(name) = block.literal_text("name") {
                    let name = name.trim().to_string();
                    if !name.is_empty() && !names.contains(&name) {
                        names.push(name);
                    }
                }
            }
        }
        names
    }

    pub fn enable_extension(&mut self, id: &str) -> Result<()> {
        let extension = registry::find_extension(id)
            .ok_or_else(|| anyhow!("unknown extension '{}'", id))?;
        if !self.extensions.contains(&extension.id) {
            self.extensions.push(extension.id);
        }
        Ok(())
    }

    pub fn palette(&self) -> Vec<(BlockCategory, &'static [BlockTemplate])> {
        registry::palette(&self.extensions)
    }
}
