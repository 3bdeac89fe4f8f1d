//! Per-agent progress display.

use crate::models::{Agent, AgentProgress, AgentStatus};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::collections::HashMap;
use std::time::Duration;

/// One spinner line per agent, updated from progress events.
pub struct AgentBoard {
    multi: MultiProgress,
    bars: HashMap<String, ProgressBar>,
}

impl AgentBoard {
    /// Build the board; with `visible` off nothing is drawn.
    pub fn new(agents: &[Agent], visible: bool) -> Self {
        let target = if visible {
            ProgressDrawTarget::stderr()
        } else {
            ProgressDrawTarget::hidden()
        };
        let multi = MultiProgress::with_draw_target(target);

        let style = ProgressStyle::with_template("{spinner:.green} {prefix:<32} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());

        let bars = agents
            .iter()
            .map(|agent| {
                let bar = multi.add(ProgressBar::new_spinner());
                bar.set_style(style.clone());
                bar.set_prefix(agent.label());
                bar.set_message("idle");
                (agent.id.clone(), bar)
            })
            .collect();

        Self { multi, bars }
    }

    pub fn update(&self, progress: &AgentProgress) {
        let Some(bar) = self.bars.get(&progress.agent_id) else {
            return;
        };

        match progress.status {
            AgentStatus::Running => {
                bar.set_message("scanning...");
                bar.enable_steady_tick(Duration::from_millis(120));
            }
            AgentStatus::Done => {
                bar.disable_steady_tick();
                bar.set_message(format!("✅ {} reports", progress.count.unwrap_or(0)));
            }
            AgentStatus::Error => {
                bar.disable_steady_tick();
                bar.set_message(format!(
                    "❌ {}",
                    progress.message.as_deref().unwrap_or("error")
                ));
            }
        }
    }

    /// Print a line above the spinners without tearing them.
    pub fn println(&self, line: &str) {
        if self.multi.is_hidden() {
            return;
        }
        let _ = self.multi.println(line);
    }

    pub fn clear(&self) {
        for bar in self.bars.values() {
            bar.finish_and_clear();
        }
    }

    #[cfg(test)]
    fn message(&self, agent_id: &str) -> Option<String> {
        self.bars.get(agent_id).map(|b| b.message())
    }
}
