//! Model routing logic.
//!
//! The [`ModelRouter`] maps a [`SystemSnapshot`], the prompt, the requested
//! [`Mode`] and an optional explicit model to a [`RoutingDecision`].
//!
//! Evaluation order is part of the contract; the first matching rule wins:
//!
//! 1. explicit model override
//! 2. forced GPU mode
//! 3. forced CPU mode
//! 4. adaptive rules (a)–(e), see [`RoutingRule`]

use serde::{Deserialize, Serialize};

use super::config::RoutingConfig;
use super::mode::Mode;
use crate::telemetry::SystemSnapshot;
use crate::word_count;

// ── Policy constants ───────────────────────────────────────────────────

/// Rule (a): GPU utilization above which the GPU counts as busy.
pub const GPU_OVERLOAD_UTIL_PCT: f64 = 85.0;
/// Rule (a): GPU memory fraction above which the GPU counts as full.
pub const GPU_OVERLOAD_MEM_RATIO: f64 = 0.95;
/// Rule (b): prompts longer than this many words are "large".
pub const LARGE_PROMPT_WORDS: usize = 60;
/// Rule (b): GPU utilization below which a large prompt may use the GPU.
pub const LARGE_PROMPT_GPU_CEILING_PCT: f64 = 90.0;
/// Rule (c): prompts shorter than this many words are "small".
pub const SMALL_PROMPT_WORDS: usize = 30;
/// Rule (c): CPU utilization below which a small prompt stays on the CPU.
pub const SMALL_PROMPT_CPU_CEILING_PCT: f64 = 80.0;
/// Rule (d): CPU utilization above which work is offloaded.
pub const CPU_OVERLOAD_UTIL_PCT: f64 = 75.0;
/// Rule (d): GPU utilization below which the GPU can take offloaded work.
pub const CPU_OFFLOAD_GPU_CEILING_PCT: f64 = 80.0;

/// Which backend class a decision landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// The CPU-oriented model.
    Cpu,
    /// The GPU-oriented model.
    Gpu,
}

/// The rule that produced a [`RoutingDecision`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingRule {
    /// The caller named a model explicitly.
    ExplicitModel,
    /// `mode = "gpu"`.
    ForcedGpu,
    /// `mode = "cpu"`.
    ForcedCpu,
    /// (a) GPU both busy and nearly full.
    GpuOverloaded,
    /// (b) Large prompt while the GPU has headroom.
    LargePrompt,
    /// (c) Small prompt while the CPU has headroom.
    SmallPrompt,
    /// (d) CPU busy while the GPU has headroom.
    CpuOverloaded,
    /// (e) Whichever side is less loaded; ties go to the GPU.
    FallbackLowerLoad,
}

impl RoutingRule {
    /// Stable snake_case label, used for metrics and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExplicitModel => "explicit_model",
            Self::ForcedGpu => "forced_gpu",
            Self::ForcedCpu => "forced_cpu",
            Self::GpuOverloaded => "gpu_overloaded",
            Self::LargePrompt => "large_prompt",
            Self::SmallPrompt => "small_prompt",
            Self::CpuOverloaded => "cpu_overloaded",
            Self::FallbackLowerLoad => "fallback_lower_load",
        }
    }

    /// Return `true` for rules that bypass adaptive evaluation.
    pub fn is_override(&self) -> bool {
        matches!(self, Self::ExplicitModel | Self::ForcedGpu | Self::ForcedCpu)
    }
}

/// The routing decision for a single request.
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    /// Identifier of the chosen backend model.
    pub selected_model: String,
    /// Human-readable explanation naming the rule and its triggering values.
    pub decision_reason: String,
    /// The rule that fired.
    pub rule: RoutingRule,
    /// Backend class. An explicit override naming neither configured model
    /// has `None`.
    pub backend: Option<Backend>,
}

/// Rule-based CPU/GPU model router.
///
/// Stateless: [`route`](Self::route) is a pure function of its inputs.
///
/// # Panics
///
/// This type and its methods never panic.
#[derive(Debug, Clone)]
pub struct ModelRouter {
    config: RoutingConfig,
}

impl ModelRouter {
    /// Create a router choosing between the models named in `config`.
    pub fn new(config: RoutingConfig) -> Self {
        Self { config }
    }

    /// The CPU-oriented model identifier.
    pub fn cpu_model(&self) -> &str {
        &self.config.cpu_model
    }

    /// The GPU-oriented model identifier.
    pub fn gpu_model(&self) -> &str {
        &self.config.gpu_model
    }

    /// The models this router can select on its own.
    pub fn known_models(&self) -> [&str; 2] {
        [self.cpu_model(), self.gpu_model()]
    }

    /// Decide which model serves `prompt`.
    ///
    /// # Arguments
    ///
    /// * `snapshot`: Telemetry taken just before the decision.
    /// * `prompt`: Raw prompt; its whitespace word count drives rules (b) and (c).
    /// * `mode`: `Cpu`/`Gpu` force a backend, `Adaptive` evaluates rules.
    /// * `explicit_model`: A non-blank value is selected verbatim.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn route(
        &self,
        snapshot: &SystemSnapshot,
        prompt: &str,
        mode: Mode,
        explicit_model: Option<&str>,
    ) -> RoutingDecision {
        if let Some(model) = explicit_model.filter(|m| !m.trim().is_empty()) {
            return RoutingDecision {
                selected_model: model.to_string(),
                decision_reason: format!("explicit model override: caller requested '{model}'"),
                rule: RoutingRule::ExplicitModel,
                backend: self.backend_of(model),
            };
        }

        match mode {
            Mode::Gpu => {
                return self.pick(
                    Backend::Gpu,
                    RoutingRule::ForcedGpu,
                    format!("forced GPU mode: mode=gpu selects {}", self.gpu_model()),
                )
            }
            Mode::Cpu => {
                return self.pick(
                    Backend::Cpu,
                    RoutingRule::ForcedCpu,
                    format!("forced CPU mode: mode=cpu selects {}", self.cpu_model()),
                )
            }
            Mode::Adaptive => {}
        }

        self.route_adaptive(snapshot, word_count(prompt))
    }

    /// Evaluate adaptive rules (a)–(e).
    fn route_adaptive(&self, snapshot: &SystemSnapshot, prompt_len: usize) -> RoutingDecision {
        let gpu_util = snapshot.gpu_util_pct;
        let cpu_util = snapshot.cpu_util_or_zero();
        let gpu_mem_ratio = snapshot.gpu_mem_ratio();

        if gpu_util > GPU_OVERLOAD_UTIL_PCT && gpu_mem_ratio > GPU_OVERLOAD_MEM_RATIO {
            return self.pick(
                Backend::Cpu,
                RoutingRule::GpuOverloaded,
                format!(
                    "GPU overloaded: gpu_util={gpu_util:.1} > {GPU_OVERLOAD_UTIL_PCT} \
                     and gpu_mem_ratio={gpu_mem_ratio:.2} > {GPU_OVERLOAD_MEM_RATIO}"
                ),
            );
        }

        if prompt_len > LARGE_PROMPT_WORDS && gpu_util < LARGE_PROMPT_GPU_CEILING_PCT {
            return self.pick(
                Backend::Gpu,
                RoutingRule::LargePrompt,
                format!(
                    "large prompt, GPU available: prompt_len={prompt_len} > {LARGE_PROMPT_WORDS} \
                     and gpu_util={gpu_util:.1} < {LARGE_PROMPT_GPU_CEILING_PCT}"
                ),
            );
        }

        if prompt_len < SMALL_PROMPT_WORDS && cpu_util < SMALL_PROMPT_CPU_CEILING_PCT {
            return self.pick(
                Backend::Cpu,
                RoutingRule::SmallPrompt,
                format!(
                    "small prompt, low CPU load: prompt_len={prompt_len} < {SMALL_PROMPT_WORDS} \
                     and cpu_util={cpu_util:.1} < {SMALL_PROMPT_CPU_CEILING_PCT}"
                ),
            );
        }

        if cpu_util > CPU_OVERLOAD_UTIL_PCT && gpu_util < CPU_OFFLOAD_GPU_CEILING_PCT {
            return self.pick(
                Backend::Gpu,
                RoutingRule::CpuOverloaded,
                format!(
                    "CPU overloaded, offload to GPU: cpu_util={cpu_util:.1} > {CPU_OVERLOAD_UTIL_PCT} \
                     and gpu_util={gpu_util:.1} < {CPU_OFFLOAD_GPU_CEILING_PCT}"
                ),
            );
        }

        if gpu_util <= cpu_util {
            self.pick(
                Backend::Gpu,
                RoutingRule::FallbackLowerLoad,
                format!(
                    "fallback, GPU less or equally loaded: gpu_util={gpu_util:.1} <= cpu_util={cpu_util:.1}"
                ),
            )
        } else {
            self.pick(
                Backend::Cpu,
                RoutingRule::FallbackLowerLoad,
                format!(
                    "fallback, CPU less loaded: cpu_util={cpu_util:.1} < gpu_util={gpu_util:.1}"
                ),
            )
        }
    }

    fn backend_of(&self, model: &str) -> Option<Backend> {
        if model == self.cpu_model() {
            Some(Backend::Cpu)
        } else if model == self.gpu_model() {
            Some(Backend::Gpu)
        } else {
            None
        }
    }

    fn pick(&self, backend: Backend, rule: RoutingRule, reason: String) -> RoutingDecision {
        let model = match backend {
            Backend::Cpu => self.cpu_model(),
            Backend::Gpu => self.gpu_model(),
        };
        RoutingDecision {
            selected_model: model.to_string(),
            decision_reason: reason,
            rule,
            backend: Some(backend),
        }
    }
}

impl Default for ModelRouter {
    fn default() -> Self {
        Self::new(RoutingConfig::default())
    }
}
