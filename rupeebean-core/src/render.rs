//! Beancount text output for [`Directive`]s.

use std::fmt::{self, Write};

use crate::ledger::{Amount, Balance, Commodity, CostSpec, Directive, Meta, Posting, Price, Transaction};

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

fn write_meta(f: &mut impl Write, meta: &Meta, indent: &str) -> fmt::Result {
    for (key, value) in meta.iter() {
        writeln!(f, "{indent}{key}: {}", quote(value))?;
    }
    Ok(())
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.number, self.currency)
    }
}

impl fmt::Display for CostSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        match (&self.number_per, &self.currency) {
            (Some(n), Some(c)) => parts.push(format!("{n} {c}")),
            (Some(n), None) => parts.push(n.to_string()),
            (None, Some(c)) => parts.push(c.clone()),
            (None, None) => {}
        }
        if let Some(date) = self.date {
            parts.push(date.format("%Y-%m-%d").to_string());
        }
        write!(f, "{{{}}}", parts.join(", "))
    }
}

fn write_posting(f: &mut impl Write, p: &Posting) -> fmt::Result {
    write!(f, "  {}", p.account)?;
    if let Some(units) = &p.units {
        write!(f, "  {units}")?;
    }
    if let Some(cost) = &p.cost {
        write!(f, " {cost}")?;
    }
    if let Some(price) = &p.price {
        write!(f, " @ {price}")?;
    }
    writeln!(f)?;
    write_meta(f, &p.meta, "    ")
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.date.format("%Y-%m-%d"), self.flag.as_char())?;
        if let Some(payee) = &self.payee {
            write!(f, " {}", quote(payee))?;
        }
        write!(f, " {}", quote(&self.narration))?;
        for tag in &self.tags {
            write!(f, " #{tag}")?;
        }
        for link in &self.links {
            write!(f, " ^{link}")?;
        }
        writeln!(f)?;
        write_meta(f, &self.meta, "  ")?;
        for p in &self.postings {
            write_posting(f, p)?;
        }
        Ok(())
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} balance {}  {}",
            self.date.format("%Y-%m-%d"),
            self.account,
            self.amount
        )?;
        write_meta(f, &self.meta, "  ")
    }
}

impl fmt::Display for Commodity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} commodity {}", self.date.format("%Y-%m-%d"), self.currency)?;
        write_meta(f, &self.meta, "  ")
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} price {}  {}",
            self.date.format("%Y-%m-%d"),
            self.currency,
            self.amount
        )
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Directive::Transaction(t) => fmt::Display::fmt(t, f),
            Directive::Balance(b) => fmt::Display::fmt(b, f),
            Directive::Commodity(c) => fmt::Display::fmt(c, f),
            Directive::Price(p) => fmt::Display::fmt(p, f),
        }
    }
}

pub fn render(directive: &Directive) -> String {
    directive.to_string()
}

/// Render every directive, separated by blank lines.
pub fn render_all(directives: &[Directive]) -> String {
    directives
        .iter()
        .map(render)
        .collect::<Vec<_>>()
        .join("\n")
}
