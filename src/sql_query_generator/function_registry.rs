/// Filter function to SQL function registry
///
/// Maps filter function names (`strToLowerCase`, `strConcat`, ...) to their SQL-92
/// equivalents with optional argument transformations. A function missing here is
/// not encodable, so any predicate using it stays in the post filter.
use std::collections::HashMap;

/// Function mapping entry
#[derive(Clone)]
pub struct FunctionMapping {
    /// Filter function name as written in filters
    pub filter_name: &'static str,
    /// SQL function name
    pub sql_name: &'static str,
    /// Rewrites already encoded SQL arguments
    pub arg_transform: Option<fn(&[String]) -> Vec<String>>,
}

/// Get the SQL mapping of a filter function (case-insensitive)
pub fn get_function_mapping(filter_fn: &str) -> Option<FunctionMapping> {
    let fn_lower = filter_fn.to_lowercase();
    FUNCTION_MAPPINGS.get(fn_lower.as_str()).cloned()
}

/// Names of every function with a SQL mapping
pub fn supported_functions() -> impl Iterator<Item = &'static str> {
    FUNCTION_MAPPINGS.values().map(|m| m.filter_name)
}

fn simple(filter_name: &'static str, sql_name: &'static str) -> FunctionMapping {
    FunctionMapping {
        filter_name,
        sql_name,
        arg_transform: None,
    }
}

// Static function mapping table
lazy_static::lazy_static! {
    static ref FUNCTION_MAPPINGS: HashMap<&'static str, FunctionMapping> = {
        let mut m = HashMap::new();

        // ===== STRING FUNCTIONS =====

        m.insert("strtolowercase", simple("strToLowerCase", "LOWER"));
        m.insert("strtouppercase", simple("strToUpperCase", "UPPER"));
        m.insert("strlength", simple("strLength", "CHAR_LENGTH"));
        m.insert("strtrim", simple("strTrim", "TRIM"));
        m.insert("strconcat", simple("strConcat", "CONCAT"));

        // strSubstring(str, begin, end) is 0-indexed with an exclusive end
        m.insert("strsubstring", FunctionMapping {
            filter_name: "strSubstring",
            sql_name: "SUBSTRING",
            arg_transform: Some(|args| {
                if args.len() == 3 {
                    vec![format!(
                        "{} FROM ({}) + 1 FOR ({}) - ({})",
                        args[0], args[1], args[2], args[1]
                    )]
                } else {
                    args.to_vec()
                }
            }),
        });

        // ===== MATH FUNCTIONS =====

        m.insert("abs", simple("abs", "ABS"));
        m.insert("ceil", simple("ceil", "CEIL"));
        m.insert("floor", simple("floor", "FLOOR"));
        m.insert("sqrt", simple("sqrt", "SQRT"));
        m.insert("round", simple("round", "ROUND"));

        m
    };
}
