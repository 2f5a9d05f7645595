//! Loop control node (§4.4.4): re-runs a nested workflow body until its
//! extracted score clears `score_threshold` or `max_loops` is exhausted,
//! carrying a trimmed `past_loops` history between iterations.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use orka_core::config::LoopConfig;
use orka_core::scoring::Preset;
use orka_core::{ComponentType, Node, Output, PastLoop, RunContext};
use orka_memory::MemoryStore;

use crate::cognitive::extract_cognitive_insights;
use crate::score_extract::extract_score;

const PAST_LOOPS_CAP: usize = 20;

pub struct LoopNode {
    id: String,
    config: LoopConfig,
    body: Box<dyn Node>,
    presets: Vec<Preset>,
    store: Option<Arc<dyn MemoryStore>>,
}

impl LoopNode {
    pub fn new(id: impl Into<String>, config: LoopConfig, body: Box<dyn Node>) -> Self {
        Self { id: id.into(), config, body, presets: Vec::new(), store: None }
    }

    pub fn with_presets(mut self, presets: Vec<Preset>) -> Self {
        self.presets = presets;
        self
    }

    pub fn with_store(mut self, store: Arc<dyn MemoryStore>) -> Self {
        self.store = Some(store);
        self
    }

    fn truncate_safe(input: &str) -> String {
        let mut chars = input.chars();
        let head: String = chars.by_ref().take(200).collect();
        if chars.next().is_some() {
            format!("{head}...<truncated>")
        } else {
            input.to_string()
        }
    }
}

fn push_capped(past_loops: &mut Vec<PastLoop>, entry: PastLoop) {
    past_loops.push(entry);
    if past_loops.len() > PAST_LOOPS_CAP {
        let excess = past_loops.len() - PAST_LOOPS_CAP;
        past_loops.drain(0..excess);
    }
}

#[async_trait]
impl Node for LoopNode {
    fn id(&self) -> &str {
        &self.id
    }

    async fn run(&self, ctx: RunContext) -> Output {
        let mut past_loops: Vec<PastLoop> = Vec::new();
        let mut current_loop = 0u32;
        let mut last_result = serde_json::Value::Null;
        let mut last_score = 0.0_f64;

        while current_loop < self.config.max_loops {
            current_loop += 1;

            let mut body_ctx = ctx.clone();
            body_ctx.loop_number = Some(current_loop);
            body_ctx.past_loops = past_loops.clone();

            let body_output = self.body.run(body_ctx).await;
            if body_output.status == orka_core::Status::Error {
                break;
            }

            let result = body_output.result.clone();
            let score = extract_score(&self.config.score_extraction_config.strategies, &result, &self.presets);
            let insights = extract_cognitive_insights(&self.config.cognitive_extraction, &result);

            let past_loop = PastLoop {
                loop_number: current_loop,
                score,
                timestamp: Utc::now(),
                insights: insights.insights,
                improvements: insights.improvements,
                mistakes: insights.mistakes,
                result: result.clone(),
            };
            push_capped(&mut past_loops, past_loop);

            if let Some(store) = &self.store {
                if self.config.persist_across_runs {
                    store.put_past_loops(&self.id, past_loops.clone()).await;
                }
            }

            last_result = result;
            last_score = score;

            if score >= self.config.score_threshold {
                return self.finish(current_loop, last_score, last_result, &past_loops, true, &ctx);
            }
        }

        self.finish(current_loop, last_score, last_result, &past_loops, false, &ctx)
    }
}

impl LoopNode {
    fn finish(
        &self,
        loops_completed: u32,
        final_score: f64,
        result: serde_json::Value,
        past_loops: &[PastLoop],
        threshold_met: bool,
        ctx: &RunContext,
    ) -> Output {
        Output::success(
            &self.id,
            ComponentType::Node,
            serde_json::json!({
                "input": Self::truncate_safe(&ctx.input_as_str()),
                "result": result,
                "loops_completed": loops_completed,
                "final_score": final_score,
                "threshold_met": threshold_met,
                "past_loops": past_loops,
            }),
        )
    }
}
