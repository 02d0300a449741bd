use crate::block::{BlockInstance, Point};
use crate::geometry;
use crate::options::RuntimeOptions;
use crate::params::Evaluator;
use crate::project::Project;
use crate::registry::BlockName;
use crate::script::Script;
use crate::services::{NoTextures, ObjectRequest, SoundService, TextureGenerator, TimedSound};
use crate::stage::{
    self, AskPrompt, SharedStage, Speech, SpriteState, ANSWER, SPRITE_RADIUS, STAGE_HEIGHT,
    STAGE_WIDTH,
};
use crate::value::{round_half_up, Value};
use anyhow::{bail, Result};
use futures::future::{FutureExt, LocalBoxFuture};
use futures::stream::{FuturesUnordered, StreamExt};
use indexmap::IndexMap;
use log::{debug, info, warn};
use rand::Rng;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::future::Future;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};

pub const FAILURE_MESSAGE: &str = "Sorry, I couldn't make that.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Stopped,
}

/// What starts chains: each matching hat on every sprite becomes one chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    FlagClicked,
    Click(String),
    Broadcast(String),
}

impl Trigger {
    fn matches(&self, sprite_id: &str, hat: &BlockInstance) -> bool {
        match (self, hat.name()) {
            (Trigger::FlagClicked, BlockName::EventsWhenFlagClicked) => true,
            (Trigger::Click(id), BlockName::EventsWhenSpriteClicked) => id == sprite_id,
            (Trigger::Broadcast(message), BlockName::EventsWhenIReceive) => hat
                .literal_text("message")
                .map_or(false, |m| m.trim().eq_ignore_ascii_case(message.trim())),
            _ => false,
        }
    }
}

struct Control {
    state: RunState,
    asks: VecDeque<(u64, oneshot::Sender<String>)>,
    next_ask: u64,
    triggers: Option<mpsc::UnboundedSender<Trigger>>,
}

/// Runs a project's scripts against its stage. Chains are interleaved on the
/// calling task, so host events arrive from futures polled alongside `run`.
pub struct Interpreter {
    stage: SharedStage,
    sound: Rc<dyn SoundService>,
    textures: Rc<dyn TextureGenerator>,
    options: RuntimeOptions,
    running: watch::Sender<bool>,
    control: RefCell<Control>,
}

impl Interpreter {
    /// Binds to `project`'s stage. Only that project can be run afterwards.
    pub fn new(
        project: &Project,
        sound: Rc<dyn SoundService>,
        textures: Rc<dyn TextureGenerator>,
        options: RuntimeOptions,
    ) -> Self {
        let (running, _) = watch::channel(false);
        Self {
            stage: project.stage().clone(),
            sound,
            textures,
            options,
            running,
            control: RefCell::new(Control {
                state: RunState::Idle,
                asks: VecDeque::new(),
                next_ask: 0,
                triggers: None,
            }),
        }
    }

    /// Timed built-in sounds and no texture generator.
    pub fn with_defaults(project: &Project) -> Self {
        Self::new(
            project,
            Rc::new(TimedSound::new()),
            Rc::new(NoTextures),
            RuntimeOptions::default(),
        )
    }

    pub fn state(&self) -> RunState {
        self.control.borrow().state
    }

    pub fn is_running(&self) -> bool {
        *self.running.borrow()
    }

    /// Green flag: runs every `when 🏁 clicked` chain until all of them finish
    /// or `stop` is called. Does nothing if a run is already in progress.
    pub async fn run(&self, project: &Project) -> Result<()> {
        self.check_project(project)?;
        self.start(project, Trigger::FlagClicked).await;
        Ok(())
    }

    /// Starts the sprite's `when this sprite clicked` chains. During a run they
    /// join it; otherwise this starts and awaits a new run.
    pub async fn click_sprite(&self, project: &Project, sprite_id: &str) -> Result<()> {
        self.check_project(project)?;
        let trigger = Trigger::Click(sprite_id.to_string());
        if self.state() == RunState::Running {
            self.send_trigger(trigger);
            return Ok(());
        }
        self.start(project, trigger).await;
        Ok(())
    }

    fn check_project(&self, project: &Project) -> Result<()> {
        if !Arc::ptr_eq(&self.stage, project.stage()) {
            bail!("project does not own this interpreter's stage");
        }
        Ok(())
    }

    pub fn stop(&self) {
        {
            let mut control = self.control.borrow_mut();
            if control.state == RunState::Running {
                control.state = RunState::Stopped;
            }
        }
        info!("stop requested");
        self.halt();
    }

    /// Answers the oldest pending ask. Returns false if nothing was asked.
    pub fn submit_answer(&self, answer: &str) -> bool {
        let Some((id, reply)) = self.control.borrow_mut().asks.pop_front() else {
            return false;
        };
        stage::lock(&self.stage).asks.retain(|ask| ask.id != id);
        let _ = reply.send(answer.to_string());
        true
    }

    async fn start(&self, project: &Project, first: Trigger) {
        if self.state() == RunState::Running {
            debug!("already running, ignoring {:?}", first);
            return;
        }
        let scripts = project.scripts().clone();
        let (triggers, mut incoming) = mpsc::unbounded_channel();
        {
            let mut control = self.control.borrow_mut();
            control.state = RunState::Running;
            control.triggers = Some(triggers);
        }
        self.running.send_replace(true);
        stage::lock(&self.stage).clear_speech();
        info!("run started by {:?}", first);

        if self.pause(self.options.start_delay).await {
            let mut chains = FuturesUnordered::new();
            self.spawn_chains(&scripts, &first, &mut chains);
            loop {
                tokio::select! {
                    biased;
                    Some(trigger) = incoming.recv() => {
                        if self.is_running() {
                            self.spawn_chains(&scripts, &trigger, &mut chains);
                        }
                    }
                    next = chains.next() => {
                        if next.is_none() {
                            break;
                        }
                    }
                }
            }
        }
        self.finish();
    }

    fn spawn_chains<'a>(
        &'a self,
        scripts: &'a IndexMap<String, Script>,
        trigger: &Trigger,
        chains: &mut FuturesUnordered<LocalBoxFuture<'a, ()>>,
    ) {
        for (sprite_id, script) in scripts {
            for hat in script.hats().filter(|hat| trigger.matches(sprite_id, hat)) {
                info!("starting chain {} on {}", hat.id, sprite_id);
                let thread = Thread {
                    interp: self,
                    scripts,
                    sprite_id,
                };
                chains.push(
                    async move {
                        if let Some(first) = geometry::resolve_successor(hat, script.blocks()) {
                            thread.run_sequence(script, first, 0).await;
                        }
                    }
                    .boxed_local(),
                );
            }
        }
    }

    fn finish(&self) {
        {
            let mut control = self.control.borrow_mut();
            if control.state == RunState::Running {
                control.state = RunState::Idle;
            }
            control.triggers = None;
        }
        self.halt();
        info!("run finished ({:?})", self.state());
    }

    /// Ends every chain at its next yield. Pending asks resolve with an empty
    /// answer so their chains can observe the stop.
    fn halt(&self) {
        self.running.send_replace(false);
        let pending = std::mem::take(&mut self.control.borrow_mut().asks);
        for (_, reply) in pending {
            let _ = reply.send(String::new());
        }
        {
            let mut stage = stage::lock(&self.stage);
            stage.clear_speech();
            stage.asks.clear();
        }
        self.sound.stop_all();
    }

    fn send_trigger(&self, trigger: Trigger) {
        if let Some(triggers) = &self.control.borrow().triggers {
            let _ = triggers.send(trigger);
        }
    }

    /// `None` if the run stops before `fut` completes.
    async fn until_stopped<T>(&self, fut: impl Future<Output = T>) -> Option<T> {
        let mut running = self.running.subscribe();
        if !*running.borrow_and_update() {
            return None;
        }
        tokio::select! {
            biased;
            _ = running.wait_for(|r| !*r) => None,
            out = fut => Some(out),
        }
    }

    /// Sleeps unless stopped first. Returns whether the run is still going.
    async fn pause(&self, duration: Duration) -> bool {
        self.until_stopped(tokio::time::sleep(duration)).await.is_some()
    }
}

/// One chain's view: which sprite it drives and where `run script` looks.
#[derive(Clone, Copy)]
struct Thread<'a> {
    interp: &'a Interpreter,
    scripts: &'a IndexMap<String, Script>,
    sprite_id: &'a str,
}

impl<'a> Thread<'a> {
    fn run_sequence(
        self,
        script: &'a Script,
        first: &'a BlockInstance,
        depth: usize,
    ) -> LocalBoxFuture<'a, ()> {
        async move {
            let mut current = Some(first);
            while let Some(block) = current {
                if !self.interp.is_running() {
                    break;
                }
                self.execute(script, block, depth).await;
                if !self.interp.pause(self.interp.options.step_delay).await {
                    break;
                }
                current = geometry::resolve_successor(block, script.blocks());
            }
        }
        .boxed_local()
    }

    /// Runs the stack inside a C-block. An empty body still yields once.
    async fn run_body(self, script: &'a Script, block: &'a BlockInstance, depth: usize) {
        if depth >= self.interp.options.max_depth {
            warn!("{} nested deeper than {}, skipping body", block.id, self.interp.options.max_depth);
            self.interp.pause(self.interp.options.step_delay).await;
            return;
        }
        match geometry::resolve_first_child(block, script.blocks()) {
            Some(first) => self.run_sequence(script, first, depth + 1).await,
            None => {
                self.interp.pause(self.interp.options.step_delay).await;
            }
        }
    }

    fn execute(self, script: &'a Script, block: &'a BlockInstance, depth: usize) -> LocalBoxFuture<'a, ()> {
        async move {
            debug!("{}: {}", self.sprite_id, block.name().as_str());
            let interp = self.interp;
            match block.name() {
                BlockName::MotionMoveSteps => {
                    let steps = self.number(block, "steps");
                    self.update(|s| {
                        let (dx, dy) = heading(s.rotation);
                        s.x += steps * dx;
                        s.y += steps * dy;
                    });
                }
                BlockName::MotionTurnCw => {
                    let degrees = self.number(block, "degrees");
                    self.update(|s| s.rotation += degrees);
                }
                BlockName::MotionTurnCcw => {
                    let degrees = self.number(block, "degrees");
                    self.update(|s| s.rotation -= degrees);
                }
                BlockName::MotionGotoXy => {
                    let (x, y) = (self.number(block, "x"), self.number(block, "y"));
                    self.update(|s| {
                        s.x = x;
                        s.y = y;
                    });
                }
                BlockName::MotionGoto => {
                    let target = match self.text(block, "target").as_str() {
                        "_random_" => {
                            let mut rng = rand::thread_rng();
                            let half_w = (STAGE_WIDTH / 2.0) as i64;
                            let half_h = (STAGE_HEIGHT / 2.0) as i64;
                            Some(Point::new(
                                rng.gen_range(-half_w..=half_w) as f64,
                                rng.gen_range(-half_h..=half_h) as f64,
                            ))
                        }
                        "_mouse_" => Some(stage::lock(&interp.stage).input.mouse),
                        _ => None,
                    };
                    if let Some(target) = target {
                        self.update(|s| {
                            s.x = target.x;
                            s.y = target.y;
                        });
                    }
                }
                BlockName::MotionPointTowards => {
                    if self.text(block, "target") == "_mouse_" {
                        let mouse = stage::lock(&interp.stage).input.mouse;
                        self.update(|s| {
                            let (dx, dy) = (mouse.x - s.x, mouse.y - s.y);
                            if dx != 0.0 || dy != 0.0 {
                                s.rotation = direction_to(dx, dy);
                            }
                        });
                    }
                }
                BlockName::MotionChangeXBy => {
                    let dx = self.number(block, "dx");
                    self.update(|s| s.x += dx);
                }
                BlockName::MotionSetX => {
                    let x = self.number(block, "x");
                    self.update(|s| s.x = x);
                }
                BlockName::MotionChangeYBy => {
                    let dy = self.number(block, "dy");
                    self.update(|s| s.y += dy);
                }
                BlockName::MotionSetY => {
                    let y = self.number(block, "y");
                    self.update(|s| s.y = y);
                }
                BlockName::MotionIfOnEdgeBounce => self.update(bounce),

                BlockName::LooksSayForSecs | BlockName::LooksThinkForSecs => {
                    let text = self.text(block, "message");
                    let seconds = self.number(block, "seconds");
                    let speech = if block.name() == BlockName::LooksSayForSecs {
                        Speech::say(text)
                    } else {
                        Speech::think(text)
                    };
                    self.update(|s| s.speech = Some(speech));
                    if interp.pause(seconds_to_duration(seconds)).await {
                        self.update(|s| s.speech = None);
                    }
                }
                BlockName::LooksSay | BlockName::LooksThink => {
                    let text = self.text(block, "message");
                    let speech = match (text.is_empty(), block.name()) {
                        (true, _) => None,
                        (false, BlockName::LooksSay) => Some(Speech::say(text)),
                        (false, _) => Some(Speech::think(text)),
                    };
                    self.update(|s| s.speech = speech);
                }
                BlockName::LooksSwitchCostume => {
                    let costume = self.text(block, "costume");
                    if !costume.is_empty() {
                        self.update(|s| s.costume = costume);
                    }
                }
                BlockName::LooksNextCostume => {
                    self.update(|s| s.costume = s.next_costume().to_string());
                }
                BlockName::LooksChangeSizeBy => {
                    let change = self.number(block, "size");
                    self.update(|s| s.size += change);
                }
                BlockName::LooksSetSize => {
                    let size = self.number(block, "size");
                    self.update(|s| s.size = size);
                }
                BlockName::LooksShow => self.update(|s| s.visible = true),
                BlockName::LooksHide => self.update(|s| s.visible = false),

                BlockName::SoundPlay => {
                    let sound = self.text(block, "sound");
                    drop(interp.sound.play(&sound, false));
                }
                BlockName::SoundPlayUntilDone => {
                    let sound = self.text(block, "sound");
                    interp.until_stopped(interp.sound.play(&sound, true)).await;
                }
                BlockName::SoundStopAll => interp.sound.stop_all(),
                BlockName::SoundChangeVolumeBy => {
                    let change = self.number(block, "volume");
                    self.update(|s| s.volume += change);
                }
                BlockName::SoundSetVolume => {
                    let volume = self.number(block, "volume");
                    self.update(|s| s.volume = volume);
                }

                BlockName::EventsBroadcast => {
                    let message = self.text(block, "message");
                    debug!("broadcast {:?}", message);
                    interp.send_trigger(Trigger::Broadcast(message));
                }

                BlockName::ControlWait => {
                    let seconds = self.number(block, "seconds");
                    interp.pause(seconds_to_duration(seconds)).await;
                }
                BlockName::ControlWaitUntil => {
                    while !self.truthy(block, "condition") {
                        if !interp.pause(interp.options.step_delay).await {
                            break;
                        }
                    }
                }
                BlockName::ControlRepeat => {
                    let times = round_half_up(self.number(block, "times"));
                    let mut done = 0.0;
                    while done < times && interp.is_running() {
                        self.run_body(script, block, depth).await;
                        done += 1.0;
                    }
                }
                BlockName::ControlForever => {
                    while interp.is_running() {
                        self.run_body(script, block, depth).await;
                    }
                }
                BlockName::ControlIf => {
                    if self.truthy(block, "condition") {
                        self.run_body(script, block, depth).await;
                    }
                }

                BlockName::SensingAskAndWait => self.ask(block).await,

                BlockName::VariablesSet => {
                    let name = self.text(block, "variable");
                    let value = self.value(block, "value");
                    if !name.is_empty() {
                        stage::lock(&interp.stage).set_variable(&name, value);
                    }
                }
                BlockName::VariablesChange => {
                    let name = self.text(block, "variable");
                    let delta = self.number(block, "value");
                    if !name.is_empty() {
                        stage::lock(&interp.stage).change_variable(&name, delta);
                    }
                }

                BlockName::MyblocksRun => {
                    let name = self.text(block, "name");
                    self.call(&name, depth).await;
                }

                BlockName::PenEraseAll => stage::lock(&interp.stage).erase_pen(),
                BlockName::PenDown => self.update(|s| s.pen.down = true),
                BlockName::PenUp => self.update(|s| s.pen.down = false),
                BlockName::PenSetColor => {
                    let color = self.text(block, "color");
                    self.update(|s| s.pen.color = color);
                }
                BlockName::PenSetSize => {
                    let size = self.number(block, "size");
                    self.update(|s| s.pen.size = size);
                }

                BlockName::ThreedCreateObject => {
                    let prompt = self.text(block, "object");
                    self.create_object(&prompt).await;
                }

                // Hats, script definitions and reporters do nothing as steps.
                _ => {}
            }
        }
        .boxed_local()
    }

    async fn ask(self, block: &BlockInstance) {
        let interp = self.interp;
        let question = self.text(block, "question");
        let (reply, answer) = oneshot::channel();
        let id = {
            let mut control = interp.control.borrow_mut();
            control.next_ask += 1;
            let id = control.next_ask;
            control.asks.push_back((id, reply));
            id
        };
        {
            let mut stage = stage::lock(&interp.stage);
            stage.asks.push_back(AskPrompt {
                id,
                question: question.clone(),
                sprite_id: self.sprite_id.to_string(),
            });
            stage.update_sprite(self.sprite_id, |s| s.speech = Some(Speech::say(question)));
        }
        let answer = answer.await.unwrap_or_default();
        if interp.is_running() {
            let mut stage = stage::lock(&interp.stage);
            stage.asks.retain(|ask| ask.id != id);
            stage.set_variable(ANSWER, Value::Text(answer));
            stage.update_sprite(self.sprite_id, |s| s.speech = None);
        }
    }

    /// Runs the body of the `create script called` block named `name`,
    /// preferring this sprite's own definition.
    async fn call(self, name: &str, depth: usize) {
        let name = name.trim();
        if name.is_empty() {
            return;
        }
        if depth >= self.interp.options.max_depth {
            warn!("run script {:?} nested deeper than {}, skipping", name, self.interp.options.max_depth);
            return;
        }
        let defines = |script: &'a Script| {
            script.blocks().iter().find(|b| {
                b.name() == BlockName::MyblocksDefine
                    && b.literal_text("name").map_or(false, |n| n.trim() == name)
            })
        };
        let own = self
            .scripts
            .get(self.sprite_id)
            .and_then(|script| defines(script).map(|define| (script, define)));
        let found = own.or_else(|| {
            self.scripts
                .values()
                .find_map(|script| defines(script).map(|define| (script, define)))
        });
        match found {
            Some((script, define)) => {
                if let Some(first) = geometry::resolve_first_child(define, script.blocks()) {
                    self.run_sequence(script, first, depth + 1).await;
                }
            }
            None => debug!("no script called {:?}", name),
        }
    }

    async fn create_object(self, prompt: &str) {
        let interp = self.interp;
        let request = ObjectRequest::from_prompt(prompt);
        stage::lock(&interp.stage).generating += 1;
        let result = interp
            .until_stopped(interp.textures.generate(&request.texture_prompt))
            .await;
        {
            let mut stage = stage::lock(&interp.stage);
            stage.generating = stage.generating.saturating_sub(1);
        }
        match result {
            None => debug!("run stopped, discarding texture for {:?}", prompt),
            Some(Ok(texture)) => {
                let id = stage::lock(&interp.stage).add_object(request.kind, &request.prompt, texture);
                info!("created {:?} {}", request.kind, id);
            }
            Some(Err(err)) => {
                warn!("texture generation failed for {:?}: {}", prompt, err);
                self.show_failure().await;
            }
        }
    }

    async fn show_failure(self) {
        self.update(|s| s.speech = Some(Speech::say(FAILURE_MESSAGE)));
        self.interp
            .pause(self.interp.options.failure_message_duration)
            .await;
        self.update(|s| {
            if s.speech.as_ref().map_or(false, |m| m.text == FAILURE_MESSAGE) {
                s.speech = None;
            }
        });
    }

    fn evaluate<T>(&self, read: impl FnOnce(&Evaluator) -> T) -> T {
        let stage = stage::lock(&self.interp.stage);
        let evaluator = Evaluator::new(&stage, self.sprite_id, self.interp.options.max_depth);
        read(&evaluator)
    }

    fn value(&self, block: &BlockInstance, name: &str) -> Value {
        self.evaluate(|e| e.param(block, name))
    }

    fn number(&self, block: &BlockInstance, name: &str) -> f64 {
        self.evaluate(|e| e.number(block, name))
    }

    fn text(&self, block: &BlockInstance, name: &str) -> String {
        self.evaluate(|e| e.text(block, name))
    }

    fn truthy(&self, block: &BlockInstance, name: &str) -> bool {
        self.evaluate(|e| e.truthy(block, name))
    }

    fn update(&self, change: impl FnOnce(&mut SpriteState)) {
        stage::lock(&self.interp.stage).update_sprite(self.sprite_id, change);
    }
}

/// Unit step for a direction: `(cos(r - 90), sin(r - 90))`, so 90 moves along
/// +x and 0 moves along -y.
fn heading(rotation: f64) -> (f64, f64) {
    let radians = rotation.to_radians();
    let snap = |v: f64| (v * 1e10).round() / 1e10;
    (snap(radians.sin()), snap(-radians.cos()))
}

/// The rotation whose `heading` points along `(dx, dy)`.
fn direction_to(dx: f64, dy: f64) -> f64 {
    dx.atan2(-dy).to_degrees()
}

fn bounce(s: &mut SpriteState) {
    let radius = SPRITE_RADIUS * s.size / 100.0;
    let (max_x, max_y) = (STAGE_WIDTH / 2.0 - radius, STAGE_HEIGHT / 2.0 - radius);
    let (dx, dy) = heading(s.rotation);
    if (s.x > max_x && dx > 0.0) || (s.x < -max_x && dx < 0.0) {
        s.rotation = -s.rotation;
    }
    if (s.y > max_y && dy > 0.0) || (s.y < -max_y && dy < 0.0) {
        s.rotation = 180.0 - s.rotation;
    }
    s.x = s.x.clamp(-max_x.max(0.0), max_x.max(0.0));
    s.y = s.y.clamp(-max_y.max(0.0), max_y.max(0.0));
}

fn seconds_to_duration(seconds: f64) -> Duration {
    if seconds.is_nan() || seconds <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX)
}
