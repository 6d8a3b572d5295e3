#![allow(dead_code)]

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use fluxify::config::Config;
use fluxify::error::Result;
use fluxify::registry::Registry;
use fluxify::tool::{CommandRunner, ToolCommand, ToolOutput};

type Script = Box<dyn Fn(&ToolCommand) -> Result<ToolOutput> + Send + Sync>;

/// Deterministic stand-in for real binaries: answers every command with a
/// script and records what was invoked.
pub struct ScriptedRunner {
    script: Script,
    calls: Mutex<Vec<ToolCommand>>,
}

impl ScriptedRunner {
    pub fn new<F>(script: F) -> Arc<Self>
    where
        F: Fn(&ToolCommand) -> Result<ToolOutput> + Send + Sync + 'static,
    {
        Arc::new(Self {
            script: Box::new(script),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<ToolCommand> {
        self.calls.lock().unwrap().clone()
    }

    pub fn programs(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.program).collect()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, command: &ToolCommand) -> Result<ToolOutput> {
        self.calls.lock().unwrap().push(command.clone());
        (self.script)(command)
    }
}

/// Write some bytes to the command's last argument, as most tools do
pub fn write_last_arg(command: &ToolCommand) {
    if let Some(path) = command.args.last() {
        std::fs::write(PathBuf::from(path), b"converted").unwrap();
    }
}

pub fn registry(runner: &Arc<ScriptedRunner>) -> Registry {
    Registry::from_config(&Config::default(), runner.clone())
}
