pub mod ast;
pub mod bank;
pub mod chart;
pub mod matcher;
pub mod parser;
pub mod transform;


pub use bank::{
    combine_row_ids, parse_ranked_row_ids, result_catalogue, MemoryBank, RowId, RuleBank, RuleRow,
};
pub use chart::{EvaluationContext, NatalChart};
pub use matcher::{match_rows, MatchResult};
pub use parser::parse_condition;
pub use transform::{assemble_rule_text, transform_condition};
