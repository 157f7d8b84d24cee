//! Operation dispatcher
//!
//! Maps an operation name and its argument list to a result value. This is
//! the single boundary where failures become payloads: domain errors, bad
//! arguments and provider failures all come back as `OpValue`, so the server
//! loop never handles per-operation errors.

use crate::math::{self, MathError};
use crate::services::{NewsProvider, ProblemSolver};
use crate::types::{Arg, ListItem, OpValue};
use futures_util::FutureExt;
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Result text for an unknown operation name
pub const INVALID_OPERATION: &str = "Operação inválida";

/// Prefix of every error-tagged result text
pub const ERROR_PREFIX: &str = "Erro: ";

/// Placeholder item when the provider returned no headlines
pub const NO_NEWS: &str = "Nenhuma notícia encontrada.";

/// Operations exposed over the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Sum,
    Subtract,
    Product,
    Divide,
    Factorial,
    Power,
    SquareRoot,
    LatestNews,
    SolveProblem,
}

impl Operation {
    pub const ALL: [Operation; 9] = [
        Operation::Sum,
        Operation::Subtract,
        Operation::Product,
        Operation::Divide,
        Operation::Factorial,
        Operation::Power,
        Operation::SquareRoot,
        Operation::LatestNews,
        Operation::SolveProblem,
    ];

    /// Wire name
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Sum => "soma",
            Operation::Subtract => "subtracao",
            Operation::Product => "produto",
            Operation::Divide => "divisao",
            Operation::Factorial => "fatorial",
            Operation::Power => "potencia",
            Operation::SquareRoot => "raiz_quadrada",
            Operation::LatestNews => "ultimas_noticias",
            Operation::SolveProblem => "math_problem_solver",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|op| op.name() == name)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn numbers(op: Operation, args: &[Arg]) -> Result<Vec<f64>, MathError> {
    args.iter()
        .map(|arg| {
            arg.as_number().ok_or_else(|| {
                MathError::InvalidArguments(format!("{} aceita apenas números (recebido {})", op, arg))
            })
        })
        .collect()
}

fn exactly<const N: usize>(op: Operation, args: &[Arg]) -> Result<[f64; N], MathError> {
    let values = numbers(op, args)?;
    <[f64; N]>::try_from(values).map_err(|values| {
        MathError::InvalidArguments(format!(
            "{} exige {} argumento(s), recebeu {}",
            op,
            N,
            values.len()
        ))
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

pub struct Dispatcher {
    solver: Arc<ProblemSolver>,
    news: Arc<dyn NewsProvider>,
    default_headline_count: usize,
}

impl Dispatcher {
    pub fn new(
        solver: Arc<ProblemSolver>,
        news: Arc<dyn NewsProvider>,
        default_headline_count: usize,
    ) -> Self {
        Self {
            solver,
            news,
            default_headline_count,
        }
    }

    /// Execute `operation` on `args`. Never fails; errors are rendered into the value.
    pub async fn execute(&self, operation: &str, args: &[Arg]) -> OpValue {
        let op = match Operation::from_name(operation) {
            Some(op) => op,
            None => {
                warn!("Unknown operation: {}", operation);
                return OpValue::Text(INVALID_OPERATION.to_string());
            }
        };

        debug!("Dispatching {} with {} args", op, args.len());

        match AssertUnwindSafe(self.run(op, args)).catch_unwind().await {
            Ok(Ok(value)) => value,
            Ok(Err(e)) => {
                debug!("{} failed: {}", op, e);
                OpValue::Text(format!("{}{}", ERROR_PREFIX, e))
            }
            Err(panic) => {
                error!("{} panicked: {}", op, panic_message(panic.as_ref()));
                OpValue::Text(format!("{}falha interna em {}", ERROR_PREFIX, op))
            }
        }
    }

    async fn run(&self, op: Operation, args: &[Arg]) -> Result<OpValue, MathError> {
        let value = match op {
            Operation::Sum => math::sum(&numbers(op, args)?)?,
            Operation::Subtract => math::subtract(&numbers(op, args)?)?,
            Operation::Product => math::product(&numbers(op, args)?)?,
            Operation::Divide => math::divide(&numbers(op, args)?)?,
            Operation::Factorial => {
                let [n] = exactly::<1>(op, args)?;
                math::factorial(n)?
            }
            Operation::Power => {
                let [base, exponent] = exactly::<2>(op, args)?;
                math::power(base, exponent)?
            }
            Operation::SquareRoot => {
                let [n] = exactly::<1>(op, args)?;
                math::square_root(n)?
            }
            Operation::LatestNews => return self.latest_news(args).await,
            Operation::SolveProblem => return self.solve_problem(args).await,
        };

        Ok(OpValue::Number(value))
    }

    async fn latest_news(&self, args: &[Arg]) -> Result<OpValue, MathError> {
        let count = match args {
            [] => self.default_headline_count,
            [Arg::Number(n)] if *n >= 0.0 && n.fract() == 0.0 => *n as usize,
            [arg] => {
                return Err(MathError::InvalidArguments(format!(
                    "ultimas_noticias exige uma quantidade inteira não negativa (recebido {})",
                    arg
                )))
            }
            _ => {
                return Err(MathError::InvalidArguments(format!(
                    "ultimas_noticias aceita no máximo 1 argumento, recebeu {}",
                    args.len()
                )))
            }
        };

        if count == 0 {
            debug!("Zero headlines requested, skipping fetch");
            return Ok(OpValue::List(vec![ListItem::Text(NO_NEWS.to_string())]));
        }

        let items = match self.news.fetch_headlines(count).await {
            Ok(headlines) if headlines.is_empty() => vec![ListItem::Text(NO_NEWS.to_string())],
            Ok(headlines) => headlines.into_iter().map(ListItem::Headline).collect(),
            Err(e) => {
                warn!("Headline fetch failed: {}", e);
                vec![ListItem::Text(format!("Erro ao obter notícias: {}", e))]
            }
        };

        Ok(OpValue::List(items))
    }

    async fn solve_problem(&self, args: &[Arg]) -> Result<OpValue, MathError> {
        let problem = match args {
            [] => "",
            [Arg::Text(text)] => text.as_str(),
            [arg] => {
                return Err(MathError::InvalidArguments(format!(
                    "math_problem_solver exige um texto (recebido {})",
                    arg
                )))
            }
            _ => {
                return Err(MathError::InvalidArguments(format!(
                    "math_problem_solver aceita no máximo 1 argumento, recebeu {}",
                    args.len()
                )))
            }
        };

        Ok(OpValue::Text(self.solver.solve(problem).await.render()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{MathRpcError, Result};
    use crate::types::Headline;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedNews {
        headlines: Vec<Headline>,
        fail: bool,
        requested: AtomicUsize,
    }

    #[async_trait]
    impl NewsProvider for FixedNews {
        async fn fetch_headlines(&self, count: usize) -> Result<Vec<Headline>> {
            self.requested.store(count, Ordering::SeqCst);
            if self.fail {
                return Err(MathRpcError::News("timeout".into()));
            }
            Ok(self.headlines.iter().take(count).cloned().collect())
        }
    }

    fn dispatcher_with(headlines: Vec<Headline>, fail: bool) -> (Dispatcher, Arc<FixedNews>) {
        let news = Arc::new(FixedNews {
            headlines,
            fail,
            requested: AtomicUsize::new(usize::MAX),
        });
        let dispatcher = Dispatcher::new(Arc::new(ProblemSolver::local_only()), news.clone(), 5);
        (dispatcher, news)
    }

    fn dispatcher() -> Dispatcher {
        dispatcher_with(Vec::new(), false).0
    }

    fn nums(values: &[f64]) -> Vec<Arg> {
        values.iter().map(|v| Arg::Number(*v)).collect()
    }

    #[test]
    fn test_operation_names_roundtrip() {
        for op in Operation::ALL {
            assert_eq!(Operation::from_name(op.name()), Some(op));
        }
        assert_eq!(Operation::from_name("modulo"), None);
    }

    #[tokio::test]
    async fn test_arithmetic() {
        let d = dispatcher();
        assert_eq!(d.execute("soma", &nums(&[1.0, 2.0, 3.0])).await, OpValue::Number(6.0));
        assert_eq!(d.execute("soma", &[]).await, OpValue::Number(0.0));
        assert_eq!(d.execute("produto", &[]).await, OpValue::Number(1.0));
        assert_eq!(d.execute("subtracao", &nums(&[10.0, 4.0])).await, OpValue::Number(6.0));
        assert_eq!(d.execute("potencia", &nums(&[2.0, 10.0])).await, OpValue::Number(1024.0));
        assert_eq!(d.execute("fatorial", &nums(&[5.0])).await, OpValue::Number(120.0));
        assert_eq!(d.execute("raiz_quadrada", &nums(&[81.0])).await, OpValue::Number(9.0));
    }

    #[tokio::test]
    async fn test_division_by_zero_value() {
        let d = dispatcher();
        assert_eq!(
            d.execute("divisao", &nums(&[10.0, 0.0])).await,
            OpValue::Text("Erro: divisão por zero".to_string())
        );
    }

    #[tokio::test]
    async fn test_domain_errors_are_values() {
        let d = dispatcher();
        assert!(d.execute("raiz_quadrada", &nums(&[-1.0])).await.is_error());
        assert!(d.execute("fatorial", &nums(&[-3.0])).await.is_error());
        assert!(d.execute("fatorial", &nums(&[4.5])).await.is_error());
        assert!(d.execute("potencia", &nums(&[-8.0, 0.5])).await.is_error());
    }

    #[tokio::test]
    async fn test_argument_validation() {
        let d = dispatcher();
        assert!(d.execute("soma", &[Arg::Number(1.0), Arg::Text("x".into())]).await.is_error());
        assert!(d.execute("potencia", &nums(&[2.0])).await.is_error());
        assert!(d.execute("fatorial", &nums(&[1.0, 2.0])).await.is_error());
        assert!(d.execute("divisao", &[]).await.is_error());
        assert!(d.execute("math_problem_solver", &nums(&[4.0])).await.is_error());
    }

    #[tokio::test]
    async fn test_unknown_operation() {
        let d = dispatcher();
        assert_eq!(
            d.execute("modulo", &nums(&[1.0])).await,
            OpValue::Text(INVALID_OPERATION.to_string())
        );
    }

    #[tokio::test]
    async fn test_news_default_count_and_records() {
        let headlines = vec![
            Headline { title: "A".into(), link: "https://a".into() },
            Headline { title: "B".into(), link: "https://b".into() },
        ];
        let (d, news) = dispatcher_with(headlines, false);

        let value = d.execute("ultimas_noticias", &[]).await;
        assert_eq!(news.requested.load(Ordering::SeqCst), 5);
        assert_eq!(value.headlines().len(), 2);

        let value = d.execute("ultimas_noticias", &nums(&[1.0])).await;
        assert_eq!(news.requested.load(Ordering::SeqCst), 1);
        assert_eq!(value.headlines().len(), 1);
    }

    #[tokio::test]
    async fn test_news_placeholders() {
        let (empty, _) = dispatcher_with(Vec::new(), false);
        assert_eq!(
            empty.execute("ultimas_noticias", &[]).await,
            OpValue::List(vec![ListItem::Text(NO_NEWS.to_string())])
        );

        let (failing, _) = dispatcher_with(Vec::new(), true);
        let value = failing.execute("ultimas_noticias", &[]).await;
        assert!(value.is_placeholder());
        assert!(!value.is_error());
        assert!(value.to_string().starts_with("Erro ao obter notícias"));
    }

    #[tokio::test]
    async fn test_problem_solver_operation() {
        let d = dispatcher();
        assert_eq!(
            d.execute("math_problem_solver", &[Arg::Text("quanto é 2 + 2".into())]).await,
            OpValue::Text("(Local) 4".to_string())
        );

        let value = d.execute("math_problem_solver", &[]).await;
        assert!(value.as_text().unwrap().starts_with("Não foi possível resolver."));
    }

    struct PanickingNews;

    #[async_trait]
    impl NewsProvider for PanickingNews {
        async fn fetch_headlines(&self, _count: usize) -> Result<Vec<Headline>> {
            panic!("selector blew up");
        }
    }

    #[tokio::test]
    async fn test_zero_headlines_skips_fetch() {
        let headlines = vec![Headline { title: "A".into(), link: "https://a".into() }];
        let (d, news) = dispatcher_with(headlines, false);

        assert_eq!(
            d.execute("ultimas_noticias", &nums(&[0.0])).await,
            OpValue::List(vec![ListItem::Text(NO_NEWS.to_string())])
        );
        assert_eq!(news.requested.load(Ordering::SeqCst), usize::MAX);
    }

    #[tokio::test]
    async fn test_provider_panic_becomes_error_value() {
        let d = Dispatcher::new(Arc::new(ProblemSolver::local_only()), Arc::new(PanickingNews), 5);

        let value = d.execute("ultimas_noticias", &[]).await;
        assert_eq!(
            value,
            OpValue::Text("Erro: falha interna em ultimas_noticias".to_string())
        );

        // The dispatcher stays usable afterwards.
        assert_eq!(d.execute("soma", &nums(&[2.0, 2.0])).await, OpValue::Number(4.0));
    }

    #[test]
    fn test_panic_message_payloads() {
        let static_payload: Box<dyn Any + Send> = Box::new("static");
        let owned_payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let other_payload: Box<dyn Any + Send> = Box::new(7u8);

        assert_eq!(panic_message(static_payload.as_ref()), "static");
        assert_eq!(panic_message(owned_payload.as_ref()), "owned");
        assert_eq!(panic_message(other_payload.as_ref()), "unknown panic");
    }
}
