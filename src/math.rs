//! Double-precision arithmetic behind the numeric operations
//!
//! Every function is pure. Failures are [`MathError`] values whose `Display`
//! text is what the client sees after the `"Erro: "` prefix.

use thiserror::Error;

/// Largest `n` whose factorial is finite in `f64`.
pub const MAX_FACTORIAL: u64 = 170;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("divisão por zero")]
    DivisionByZero,

    #[error("fatorial exige um inteiro não negativo (recebido {0})")]
    FactorialDomain(String),

    #[error("raiz quadrada de número negativo ({0})")]
    NegativeSquareRoot(String),

    #[error("potência com base negativa e expoente fracionário não é real")]
    ComplexPower,

    #[error("zero não pode ser elevado a expoente negativo")]
    ZeroToNegativePower,

    #[error("resultado fora do intervalo numérico")]
    OutOfRange,

    #[error("{0}")]
    InvalidArguments(String),
}

fn finite(value: f64) -> Result<f64, MathError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(MathError::OutOfRange)
    }
}

pub fn sum(values: &[f64]) -> Result<f64, MathError> {
    finite(values.iter().fold(0.0, |acc, v| acc + v))
}

pub fn subtract(values: &[f64]) -> Result<f64, MathError> {
    let (first, rest) = values
        .split_first()
        .ok_or_else(|| MathError::InvalidArguments("subtracao exige ao menos um argumento".into()))?;
    finite(rest.iter().fold(*first, |acc, v| acc - v))
}

pub fn product(values: &[f64]) -> Result<f64, MathError> {
    finite(values.iter().fold(1.0, |acc, v| acc * v))
}

/// Left-fold division. A zero anywhere after the first argument is an error,
/// even when an earlier step already produced zero.
pub fn divide(values: &[f64]) -> Result<f64, MathError> {
    let (first, rest) = values
        .split_first()
        .ok_or_else(|| MathError::InvalidArguments("divisao exige ao menos um argumento".into()))?;
    if rest.iter().any(|d| *d == 0.0) {
        return Err(MathError::DivisionByZero);
    }
    finite(rest.iter().fold(*first, |acc, d| acc / d))
}

pub fn factorial(n: f64) -> Result<f64, MathError> {
    if !n.is_finite() || n < 0.0 || n.fract() != 0.0 {
        return Err(MathError::FactorialDomain(crate::types::format_number(n)));
    }
    if n > MAX_FACTORIAL as f64 {
        return Err(MathError::OutOfRange);
    }

    let n = n as u64;
    // Exact in u64 up to 20!, and every n! up to 22! is exactly representable in f64.
    match (1..=n).try_fold(1u64, |acc, k| acc.checked_mul(k)) {
        Some(exact) => Ok(exact as f64),
        None => finite((1..=n).fold(1.0, |acc, k| acc * k as f64)),
    }
}

pub fn power(base: f64, exponent: f64) -> Result<f64, MathError> {
    if base < 0.0 && exponent.fract() != 0.0 {
        return Err(MathError::ComplexPower);
    }
    if base == 0.0 && exponent < 0.0 {
        return Err(MathError::ZeroToNegativePower);
    }
    finite(base.powf(exponent))
}

pub fn square_root(value: f64) -> Result<f64, MathError> {
    if value < 0.0 {
        return Err(MathError::NegativeSquareRoot(crate::types::format_number(value)));
    }
    Ok(value.sqrt())
}
