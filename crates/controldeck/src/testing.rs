//! Test doubles shared by the server modules.

use std::collections::HashMap;
use std::sync::Mutex;

use controldeck_core::{CommandLine, CommandRunner};

/// Records every command and answers probes from a fixed table.
#[derive(Default)]
pub struct RecordingRunner {
    responses: HashMap<String, String>,
    spawned: Mutex<Vec<String>>,
    probed: Mutex<Vec<String>>,
}

impl RecordingRunner {
    pub fn with_probe(mut self, command: &str, output: &str) -> Self {
        self.responses
            .insert(command.to_string(), output.to_string());
        self
    }

    pub fn spawns(&self) -> Vec<String> {
        self.spawned.lock().expect("spawn log").clone()
    }

    pub fn probes(&self) -> Vec<String> {
        self.probed.lock().expect("probe log").clone()
    }
}

impl CommandRunner for RecordingRunner {
    fn spawn(&self, command: &CommandLine) {
        self.spawned
            .lock()
            .expect("spawn log")
            .push(command.to_string());
    }

    fn probe(&self, command: &CommandLine) -> String {
        let key = command.to_string();
        self.probed.lock().expect("probe log").push(key.clone());
        self.responses.get(&key).cloned().unwrap_or_default()
    }
}
