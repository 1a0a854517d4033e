//! Parsing of compact runtime signature spellings, e.g. `i64(str,i64)`.

use std::fmt;

use il_core::Type;
use il_support::{Diag, Expected};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub ret: Type,
    pub params: Vec<Type>,
}

impl Signature {
    pub fn new(ret: Type, params: Vec<Type>) -> Self {
        Self { ret, params }
    }

    /// Parses `"<ret>(<p1>,<p2>,...)"`, e.g. `"i64(str,i64)"` or `"void()"`.
    pub fn parse(spelling: &str) -> Expected<Signature> {
        let open = spelling
            .find('(')
            .ok_or_else(|| Diag::error(format!("malformed signature `{spelling}`: missing `(`")))?;
        if !spelling.ends_with(')') {
            return Err(Diag::error(format!("malformed signature `{spelling}`: missing `)`")));
        }
        let ret_str = spelling[..open].trim();
        let ret = Type::from_mnemonic(ret_str)
            .ok_or_else(|| Diag::error(format!("malformed signature `{spelling}`: unknown return type `{ret_str}`")))?;
        let params_str = &spelling[open + 1..spelling.len() - 1];
        let params = if params_str.trim().is_empty() {
            Vec::new()
        } else {
            params_str
                .split(',')
                .map(|p| {
                    let p = p.trim();
                    Type::from_mnemonic(p).ok_or_else(|| {
                        Diag::error(format!("malformed signature `{spelling}`: unknown param type `{p}`"))
                    })
                })
                .collect::<Expected<Vec<Type>>>()?
        };
        Ok(Signature { ret, params })
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.ret)?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{p}")?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_params_and_ret() {
        let sig = Signature::parse("i64(str,i64)").unwrap();
        assert_eq!(sig.ret, Type::I64);
        assert_eq!(sig.params, vec![Type::Str, Type::I64]);
    }

    #[test]
    fn parses_no_params() {
        let sig = Signature::parse("void()").unwrap();
        assert!(sig.params.is_empty());
    }

    #[test]
    fn rejects_unknown_type() {
        assert!(Signature::parse("bogus(i64)").is_err());
    }

    #[test]
    fn display_round_trips_parse() {
        let sig = Signature::parse("f64(f64,f64)").unwrap();
        assert_eq!(Signature::parse(&sig.to_string()).unwrap(), sig);
    }
}
