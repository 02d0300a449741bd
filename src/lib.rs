pub mod block;
pub mod geometry;
pub mod interpreter;
pub mod logging;
pub mod options;
pub mod params;
pub mod project;
pub mod registry;
pub mod script;
pub mod services;
pub mod stage;
pub mod value;

pub use block::{BlockId, BlockInstance, ParamValue, Point};
pub use interpreter::{Interpreter, RunState, Trigger};
pub use options::RuntimeOptions;
pub use project::Project;
pub use registry::{BlockCategory, BlockName, BlockShape};
pub use script::Script;
pub use services::{SoundService, TextureError, TextureGenerator};
pub use stage::{SharedStage, Stage, StageSnapshot};
pub use value::Value;
