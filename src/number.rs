// ABOUTME: The numeric tower and the radix/exactness number grammar (spec §4.B.1)

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{ToPrimitive, Zero};
use serde::{Deserialize, Serialize};
use std::fmt;

use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_while1},
    character::complete::one_of,
    combinator::{opt, recognize},
    multi::many1,
    sequence::{pair, tuple},
    IResult,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Radix {
    Binary = 2,
    Octal = 8,
    Decimal = 10,
    Hex = 16,
}

impl Radix {
    pub fn value(self) -> u32 {
        self as u32
    }

    fn digit_chars(self) -> &'static str {
        match self {
            Radix::Binary => "01",
            Radix::Octal => "01234567",
            Radix::Decimal => "0123456789",
            Radix::Hex => "0123456789abcdefABCDEF",
        }
    }

    /// Exponent markers accepted for this radix. Hex excludes `e`/`f` since
    /// they are hex digits (spec §9 "extra-exp-chars").
    fn exp_markers(self) -> &'static str {
        match self {
            Radix::Hex => "dlsDLS",
            _ => "dlsefDLSEF",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exactness {
    Exact,
    Inexact,
    Unspecified,
}

/// The numeric tower (spec §3). Rationals are always stored reduced with a
/// positive denominator (guaranteed by `num_rational::BigRational`'s own
/// invariant); integer-valued rationals collapse to an integer on
/// construction, and big integers shrink to machine ints when they fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Number {
    SmallInt(i32),
    LongInt(i64),
    BigInt(BigInt),
    Rational(BigRational),
    Double(f64),
    ComplexDouble(f64, f64),
    ComplexRational(BigRational, BigRational),
}

impl Number {
    /// Collapses a big integer to the smallest machine representation that
    /// holds it exactly ("shrink", spec §3/§8).
    pub fn from_bigint(n: BigInt) -> Number {
        if let Some(i) = n.to_i32() {
            Number::SmallInt(i)
        } else if let Some(l) = n.to_i64() {
            Number::LongInt(l)
        } else {
            Number::BigInt(n)
        }
    }

    /// Collapses an integer-valued rational to an integer, otherwise keeps
    /// it reduced (spec §3 invariant).
    pub fn from_rational(r: BigRational) -> Number {
        if r.is_integer() {
            Number::from_bigint(r.to_integer())
        } else {
            Number::Rational(r)
        }
    }

    pub fn from_complex_rational(re: BigRational, im: BigRational) -> Number {
        Number::ComplexRational(re, im)
    }

    pub fn zero() -> Number {
        Number::SmallInt(0)
    }

    pub fn is_exact(&self) -> bool {
        matches!(self, Number::SmallInt(_) | Number::LongInt(_) | Number::BigInt(_) | Number::Rational(_) | Number::ComplexRational(_, _))
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::SmallInt(n) => write!(f, "{n}"),
            Number::LongInt(n) => write!(f, "{n}"),
            Number::BigInt(n) => write!(f, "{n}"),
            Number::Rational(r) => write!(f, "{}/{}", r.numer(), r.denom()),
            Number::Double(d) => write!(f, "{d}"),
            Number::ComplexDouble(re, im) => write!(f, "{re}{}{}i", if *im >= 0.0 { "+" } else { "" }, im),
            Number::ComplexRational(re, im) => write!(f, "{re}+{im}i"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NumberError {
    #[error("division by zero in rational literal")]
    DivisionByZero,
    #[error("not a number")]
    NotANumber,
    #[error("multiple radix flags")]
    MultipleRadixFlags,
    #[error("multiple exactness flags")]
    MultipleExactnessFlags,
}

fn digit1_radix(input: &str, radix: Radix) -> IResult<&str, &str> {
    take_while1(|c: char| radix.digit_chars().contains(c))(input)
}

fn sign(input: &str) -> IResult<&str, Option<char>> {
    opt(one_of("+-"))(input)
}

fn signed_magnitude(sign: Option<char>, digits: &str, radix: Radix) -> BigInt {
    let magnitude = BigInt::parse_bytes(digits.as_bytes(), radix.value()).unwrap_or_else(BigInt::zero);
    if sign == Some('-') {
        -magnitude
    } else {
        magnitude
    }
}

/// `[+-](inf|nan).0`
fn parse_special(input: &str) -> IResult<&str, Number> {
    let (rest, (s, kind)) = pair(one_of("+-"), alt((tag_no_case("inf"), tag_no_case("nan"))))(input)?;
    let (rest, _) = tag(".0")(rest)?;
    let value = if kind.eq_ignore_ascii_case("inf") {
        if s == '-' {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        }
    } else {
        f64::NAN
    };
    Ok((rest, Number::Double(value)))
}

struct RealLexeme<'a> {
    sign: Option<char>,
    int_part: &'a str,
    frac_part: Option<&'a str>,
    has_point: bool,
    exponent: Option<(Option<char>, &'a str)>,
}

fn parse_real_lexeme<'a>(input: &'a str, radix: Radix) -> IResult<&'a str, RealLexeme<'a>> {
    let (rest, s) = sign(input)?;
    let (rest, (int_part, frac)) = alt((
        // digits ('.' digits?)?
        |i| -> IResult<&str, (&str, Option<Option<&str>>)> {
            let (i, int_part) = digit1_radix(i, radix)?;
            let (i, frac) = opt(pair(tag("."), opt(|x| digit1_radix(x, radix))))(i)?;
            Ok((i, (int_part, frac.map(|(_, d)| d))))
        },
        // '.' digits
        |i| -> IResult<&str, (&str, Option<Option<&str>>)> {
            let (i, _) = tag(".")(i)?;
            let (i, digits) = digit1_radix(i, radix)?;
            Ok((i, ("", Some(Some(digits)))))
        },
    ))(rest)?;
    let has_point = frac.is_some();
    let frac_part = frac.flatten();
    let (rest, exponent) = opt(|i| -> IResult<&str, (Option<char>, &str)> {
        let (i, _marker) = one_of(radix.exp_markers())(i)?;
        let (i, esign) = sign(i)?;
        let (i, edigits) = digit1_radix(i, Radix::Decimal)?;
        Ok((i, (esign, edigits)))
    })(rest)?;
    Ok((
        rest,
        RealLexeme {
            sign: s,
            int_part,
            frac_part,
            has_point,
            exponent,
        },
    ))
}

fn exponent_value(exponent: &Option<(Option<char>, &str)>) -> i64 {
    match exponent {
        None => 0,
        Some((esign, digits)) => {
            let v: i64 = digits.parse().unwrap_or(0);
            if *esign == Some('-') {
                -v
            } else {
                v
            }
        }
    }
}

/// Builds a `Number` from an already-scanned real lexeme, honoring the
/// exactness rules in spec §4.B.1.
fn real_lexeme_to_number(lex: &RealLexeme, radix: Radix, exactness: Exactness) -> Number {
    if !lex.has_point && lex.exponent.is_none() {
        let digits = if lex.int_part.is_empty() { "0" } else { lex.int_part };
        let n = signed_magnitude(lex.sign, digits, radix);
        return match exactness {
            Exactness::Inexact => Number::Double(n.to_f64().unwrap_or(f64::NAN)),
            _ => Number::from_bigint(n),
        };
    }

    match exactness {
        Exactness::Exact => {
            let frac = lex.frac_part.unwrap_or("");
            let whole_digits = format!("{}{}", if lex.int_part.is_empty() { "0" } else { lex.int_part }, frac);
            let whole = BigInt::parse_bytes(whole_digits.as_bytes(), radix.value()).unwrap_or_else(BigInt::zero);
            let whole = if lex.sign == Some('-') { -whole } else { whole };
            let frac_len = frac.len() as i64;
            let exp = exponent_value(&lex.exponent) - frac_len;
            let ten = BigInt::from(radix.value());
            let r = if exp >= 0 {
                BigRational::from_integer(whole * ten.pow(exp as u32))
            } else {
                BigRational::new(whole, ten.pow((-exp) as u32))
            };
            Number::from_rational(r)
        }
        _ => {
            let text = format!(
                "{}{}{}{}{}",
                lex.sign.map(|c| c.to_string()).unwrap_or_default(),
                if lex.int_part.is_empty() { "0" } else { lex.int_part },
                if lex.has_point { "." } else { "" },
                lex.frac_part.unwrap_or(""),
                lex.exponent
                    .map(|(s, d)| format!("e{}{}", s.map(|c| c.to_string()).unwrap_or_default(), d))
                    .unwrap_or_default()
            );
            let value = if radix == Radix::Decimal {
                text.parse::<f64>().unwrap_or(f64::NAN)
            } else {
                // Non-decimal inexact reals are rare; fall back to the
                // exact rational value widened to f64.
                let frac = lex.frac_part.unwrap_or("");
                let whole_digits = format!("{}{}", if lex.int_part.is_empty() { "0" } else { lex.int_part }, frac);
                let whole = BigInt::parse_bytes(whole_digits.as_bytes(), radix.value()).unwrap_or_else(BigInt::zero);
                let whole = if lex.sign == Some('-') { -whole } else { whole };
                let ten = BigInt::from(radix.value());
                let frac_len = frac.len() as i64;
                let exp = exponent_value(&lex.exponent) - frac_len;
                let r = if exp >= 0 {
                    BigRational::from_integer(whole * ten.pow(exp as u32))
                } else {
                    BigRational::new(whole, ten.pow((-exp) as u32))
                };
                r.to_f64().unwrap_or(f64::NAN)
            };
            Number::Double(value)
        }
    }
}

fn parse_rational_lexeme(input: &str, radix: Radix) -> IResult<&str, (Option<char>, &str, &str)> {
    let (rest, (s, num, _, den)) = tuple((sign, |i| digit1_radix(i, radix), tag("/"), |i| digit1_radix(i, radix)))(input)?;
    Ok((rest, (s, num, den)))
}

fn rational_from_parts(sign: Option<char>, num: &str, den: &str, radix: Radix) -> Result<BigRational, NumberError> {
    let d = BigInt::parse_bytes(den.as_bytes(), radix.value()).unwrap_or_else(BigInt::zero);
    if d.is_zero() {
        return Err(NumberError::DivisionByZero);
    }
    let n = signed_magnitude(sign, num, radix);
    Ok(BigRational::new(n, d))
}

/// Parses a mandatory-sign imaginary suffix — `real_imag 'i'` or
/// `rational_imag 'i'` — from the front of `input` (spec §4.B.1 "sign
/// required on imag"). Returns the imaginary part's exact value and the
/// unconsumed remainder, or `None` if `input` doesn't start with one.
fn parse_imaginary_suffix<'a>(input: &'a str, radix: Radix) -> Result<Option<(BigRational, &'a str)>, NumberError> {
    if let Ok((rest, (s, num, den))) = parse_rational_lexeme(input, radix) {
        if s.is_some() {
            if let Some(rest2) = rest.strip_prefix('i') {
                let r = rational_from_parts(s, num, den, radix)?;
                return Ok(Some((r, rest2)));
            }
        }
    }
    if let Ok((rest, lex)) = parse_real_lexeme(input, radix) {
        let is_real_lexeme = !(lex.int_part.is_empty() && lex.frac_part.is_none());
        if lex.sign.is_some() && is_real_lexeme {
            if let Some(rest2) = rest.strip_prefix('i') {
                let im_num = real_lexeme_to_number(&lex, radix, Exactness::Exact);
                return Ok(Some((number_to_rational(&im_num), rest2)));
            }
        }
    }
    Ok(None)
}

/// Scans the maximal-munch numeric lexeme from the front of `input` under
/// the given radix/exactness flags (already consumed by the scanner from
/// any leading `#b|o|d|x|e|i` tags). Returns the parsed number and the
/// unconsumed remainder, or `None` if `input` does not start with a number
/// under these flags.
pub fn scan_number(input: &str, radix: Radix, exactness: Exactness) -> Result<Option<(Number, &str)>, NumberError> {
    if let Ok((rest, n)) = parse_special(input) {
        return Ok(Some((n, rest)));
    }

    // An unsigned trailing `i` is never part of a number (Open Question 3):
    // only look for a complex/imaginary suffix when a sign was present.
    if let Ok((rest, (s, num, den))) = parse_rational_lexeme(input, radix) {
        if let Some(rest2) = rest.strip_prefix('i') {
            if s.is_some() {
                let im = rational_from_parts(s, num, den, radix)?;
                return Ok(Some((complex_from_rational(BigRational::from_integer(BigInt::zero()), im, exactness), rest2)));
            }
        }
        // Rectangular complex with a rational real part: `real_imag 'i'`
        // or `rational_imag 'i'` immediately follows (e.g. `3/4+5i`).
        if let Some((im, rest2)) = parse_imaginary_suffix(rest, radix)? {
            let re = rational_from_parts(s, num, den, radix)?;
            return Ok(Some((complex_from_rational(re, im, exactness), rest2)));
        }
        let r = rational_from_parts(s, num, den, radix)?;
        return Ok(Some((finish_exactness(Number::from_rational(r), exactness), rest)));
    }

    if let Ok((rest, lex)) = parse_real_lexeme(input, radix) {
        if lex.int_part.is_empty() && lex.frac_part.is_none() {
            return Ok(None);
        }
        if let Some(rest2) = rest.strip_prefix('i') {
            if lex.sign.is_some() {
                let im_num = real_lexeme_to_number(&lex, radix, Exactness::Exact);
                let im_r = number_to_rational(&im_num);
                return Ok(Some((complex_from_rational(BigRational::from_integer(BigInt::zero()), im_r, exactness), rest2)));
            }
        }
        if let Some(rest2) = rest.strip_prefix('@') {
            // Polar form: recognized, value production deferred to the
            // numeric collaborator (spec §4.B.1) — no real/imaginary
            // projection is computed here.
            if let Ok((rest3, _mag_lex)) = parse_real_lexeme(rest2, radix) {
                return Ok(Some((Number::Double(f64::NAN), rest3)));
            }
        }
        // Rectangular complex with a real (possibly fractional) real part:
        // `real_imag 'i'` or `rational_imag 'i'` immediately follows
        // (e.g. `3+4i`, `3.5+1/2i`).
        if let Some((im, rest2)) = parse_imaginary_suffix(rest, radix)? {
            let re_num = real_lexeme_to_number(&lex, radix, Exactness::Exact);
            let re = number_to_rational(&re_num);
            return Ok(Some((complex_from_rational(re, im, exactness), rest2)));
        }
        let n = real_lexeme_to_number(&lex, radix, exactness);
        return Ok(Some((n, rest)));
    }

    Ok(None)
}

fn finish_exactness(n: Number, exactness: Exactness) -> Number {
    match (exactness, &n) {
        (Exactness::Inexact, Number::SmallInt(_) | Number::LongInt(_) | Number::BigInt(_) | Number::Rational(_)) => Number::Double(n.to_f64_approx()),
        _ => n,
    }
}

fn number_to_rational(n: &Number) -> BigRational {
    match n {
        Number::SmallInt(i) => BigRational::from_integer(BigInt::from(*i)),
        Number::LongInt(i) => BigRational::from_integer(BigInt::from(*i)),
        Number::BigInt(b) => BigRational::from_integer(b.clone()),
        Number::Rational(r) => r.clone(),
        Number::Double(d) => BigRational::from_float_approx(*d),
        _ => BigRational::from_integer(BigInt::zero()),
    }
}

fn complex_from_rational(re: BigRational, im: BigRational, exactness: Exactness) -> Number {
    match exactness {
        Exactness::Inexact => Number::ComplexDouble(re.to_f64().unwrap_or(f64::NAN), im.to_f64().unwrap_or(f64::NAN)),
        _ => Number::ComplexRational(re, im),
    }
}

impl Number {
    fn to_f64_approx(&self) -> f64 {
        match self {
            Number::SmallInt(i) => *i as f64,
            Number::LongInt(i) => *i as f64,
            Number::BigInt(b) => b.to_f64().unwrap_or(f64::NAN),
            Number::Rational(r) => r.to_f64().unwrap_or(f64::NAN),
            Number::Double(d) => *d,
            Number::ComplexDouble(re, _) => *re,
            Number::ComplexRational(re, _) => re.to_f64().unwrap_or(f64::NAN),
        }
    }
}

trait BigRationalExt {
    fn from_float_approx(d: f64) -> BigRational;
}

impl BigRationalExt for BigRational {
    fn from_float_approx(d: f64) -> BigRational {
        // Only used on the rare complex-literal-from-double path; a
        // denominator-reduced approximation is adequate here since this
        // value only ever feeds back into an inexact complex number.
        BigRational::new(BigInt::from((d * 1_000_000.0) as i64), BigInt::from(1_000_000))
    }
}

/// Parses a bare `#b|o|d|x` radix tag, returning the selected radix. Used
/// by the scanner when it sees a leading `#` flag run (spec §4.B item 3).
pub fn radix_from_flag(c: char) -> Option<Radix> {
    match c.to_ascii_lowercase() {
        'b' => Some(Radix::Binary),
        'o' => Some(Radix::Octal),
        'd' => Some(Radix::Decimal),
        'x' => Some(Radix::Hex),
        _ => None,
    }
}

pub fn exactness_from_flag(c: char) -> Option<Exactness> {
    match c.to_ascii_lowercase() {
        'e' => Some(Exactness::Exact),
        'i' => Some(Exactness::Inexact),
        _ => None,
    }
}
