//! ResultProcessors — per-query-key conversion of raw captures into typed
//! record types. Grounded on
//! `lsp-daemon::relationship::types::{ImportPattern, CallPattern, ...}`'s
//! builder/predicate style, generalized from pattern-matching predicates to
//! pure `Match -> Record` conversion functions, one per registered query key.

use serde::{Deserialize, Serialize};

use crate::query::{Match, Point};

/// Context threaded through every processor: where the match came from.
#[derive(Debug, Clone)]
pub struct ProcessingContext {
    pub source_file: String,
    pub language: String,
}

/// A source location, derived from a capture's [`NodeRegion`](crate::query::NodeRegion).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

impl From<Point> for Location {
    fn from(p: Point) -> Self {
        Location {
            line: p.row as u32 + 1,
            column: p.column as u32,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportSource {
    pub source: String,
    pub is_relative: bool,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDeclaration {
    pub name: String,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceDeclaration {
    pub name: String,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    pub name: String,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodDeclaration {
    pub name: String,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDeclaration {
    pub name: String,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallExpression {
    pub callee: String,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heading {
    pub text: String,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub destination: String,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeBlock {
    pub info_string: Option<String>,
    pub location: Location,
}

/// A structured warning emitted when an individual match cannot be
/// interpreted — it does not abort processing of the remaining matches
///.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessorWarning {
    pub query_key: String,
    pub message: String,
}

/// Strip the surrounding quote characters a string-literal capture carries
/// (tree-sitter string nodes include their delimiters in `.text`).
fn unquote(text: &str) -> &str {
    text.trim_matches(|c| c == '"' || c == '\'' || c == '`')
}

fn is_relative_source(source: &str) -> bool {
    source.starts_with('.') || source.starts_with('/')
}

macro_rules! process_named {
    ($fn_name:ident, $record:ident, $capture:literal) => {
        pub fn $fn_name(matches: &[Match], _context: &ProcessingContext) -> (Vec<$record>, Vec<ProcessorWarning>) {
            let mut records = Vec::new();
            let mut warnings = Vec::new();
            for m in matches {
                match m.captures.get($capture) {
                    Some(region) => records.push($record {
                        name: region.text.clone(),
                        location: region.start_point.into(),
                    }),
                    None => warnings.push(ProcessorWarning {
                        query_key: m.query_key.clone(),
                        message: format!("match is missing the '{}' capture", $capture),
                    }),
                }
            }
            (records, warnings)
        }
    };
}

process_named!(process_class_declarations, ClassDeclaration, "name");
process_named!(process_interface_declarations, InterfaceDeclaration, "name");
process_named!(process_function_declarations, FunctionDeclaration, "name");
process_named!(process_method_declarations, MethodDeclaration, "name");
process_named!(process_type_declarations, TypeDeclaration, "name");

/// Processor for every `*-import-sources` query key.
pub fn process_import_sources(matches: &[Match], _context: &ProcessingContext) -> (Vec<ImportSource>, Vec<ProcessorWarning>) {
    let mut records = Vec::new();
    let mut warnings = Vec::new();
    for m in matches {
        match m.captures.get("source") {
            Some(region) => {
                let source = unquote(&region.text).to_string();
                records.push(ImportSource {
                    is_relative: is_relative_source(&source),
                    source,
                    location: region.start_point.into(),
                });
            }
            None => warnings.push(ProcessorWarning {
                query_key: m.query_key.clone(),
                message: "match is missing the 'source' capture".to_string(),
            }),
        }
    }
    (records, warnings)
}

pub fn process_call_expressions(matches: &[Match], _context: &ProcessingContext) -> (Vec<CallExpression>, Vec<ProcessorWarning>) {
    let mut records = Vec::new();
    let mut warnings = Vec::new();
    for m in matches {
        match m.captures.get("callee") {
            Some(region) => records.push(CallExpression {
                callee: region.text.clone(),
                location: region.start_point.into(),
            }),
            None => warnings.push(ProcessorWarning {
                query_key: m.query_key.clone(),
                message: "match is missing the 'callee' capture".to_string(),
            }),
        }
    }
    (records, warnings)
}

pub fn process_headings(matches: &[Match], _context: &ProcessingContext) -> (Vec<Heading>, Vec<ProcessorWarning>) {
    let mut records = Vec::new();
    let mut warnings = Vec::new();
    for m in matches {
        match m.captures.get("text") {
            Some(region) => records.push(Heading {
                text: region.text.trim().to_string(),
                location: region.start_point.into(),
            }),
            None => warnings.push(ProcessorWarning {
                query_key: m.query_key.clone(),
                message: "match is missing the 'text' capture".to_string(),
            }),
        }
    }
    (records, warnings)
}

pub fn process_links(matches: &[Match], _context: &ProcessingContext) -> (Vec<Link>, Vec<ProcessorWarning>) {
    let mut records = Vec::new();
    let mut warnings = Vec::new();
    for m in matches {
        match m.captures.get("dest") {
            Some(region) => records.push(Link {
                destination: region.text.clone(),
                location: region.start_point.into(),
            }),
            None => warnings.push(ProcessorWarning {
                query_key: m.query_key.clone(),
                message: "match is missing the 'dest' capture".to_string(),
            }),
        }
    }
    (records, warnings)
}

pub fn process_code_blocks(matches: &[Match], _context: &ProcessingContext) -> (Vec<CodeBlock>, Vec<ProcessorWarning>) {
    let mut records = Vec::new();
    for m in matches {
        let location = m
            .captures
            .get("code")
            .or_else(|| m.captures.values().next())
            .map(|r| r.start_point.into())
            .unwrap_or(Location { line: 0, column: 0 });
        records.push(CodeBlock {
            info_string: m.captures.get("lang").map(|r| r.text.clone()),
            location,
        });
    }
    (records, Vec::new())
}
