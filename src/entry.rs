//! Institute entry numbers.
//!
//! Student mailboxes are named after the entry number, e.g. `cs1200123` is a
//! B.Tech (`1`) Computer Science student who joined in 2020 (`20`). Staff and
//! test accounts simply don't parse.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static ENTRY_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^([a-z]{2,3})(\d)(\d{2})(\d{3,4})$").expect("entry number regex")
});

const DEPARTMENTS: &[(&str, &str)] = &[
    ("am", "Applied Mechanics"),
    ("bb", "Biochemical Engineering and Biotechnology"),
    ("ce", "Civil Engineering"),
    ("ch", "Chemical Engineering"),
    ("cs", "Computer Science and Engineering"),
    ("cy", "Chemistry"),
    ("ee", "Electrical Engineering"),
    ("es", "Energy Science and Engineering"),
    ("hu", "Humanities and Social Sciences"),
    ("me", "Mechanical Engineering"),
    ("ms", "Management Studies"),
    ("mt", "Mathematics and Computing"),
    ("ph", "Engineering Physics"),
    ("tt", "Textile and Fibre Engineering"),
    ("as", "Atmospheric Sciences"),
    ("mas", "Mathematics"),
    ("bio", "Biological Sciences"),
    ("eet", "Electrical Engineering (Power and Automation)"),
    ("mml", "Materials Engineering"),
    ("pse", "Process Engineering and Design"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryInfo {
    pub department_code: String,
    pub department: &'static str,
    pub program: &'static str,
    pub entry_year: i64,
}

fn program(digit: &str) -> &'static str {
    match digit {
        "1" => "B.Tech",
        "2" => "M.Tech",
        "5" => "Dual Degree",
        "6" => "M.Sc.",
        "7" => "M.Des/M.B.A",
        "8" => "M.S. (Research)",
        "9" => "Ph.D.",
        _ => "Other",
    }
}

pub fn parse(email: &str) -> Option<EntryInfo> {
    let local = email.split('@').next()?;
    let caps = ENTRY_NUMBER.captures(local)?;

    let code = caps[1].to_lowercase();
    let &(_, department) = DEPARTMENTS.iter().find(|(c, _)| *c == code)?;
    let year: i64 = caps[3].parse().ok()?;

    Some(EntryInfo {
        department_code: code,
        department,
        program: program(&caps[2]),
        entry_year: 2000 + year,
    })
}
