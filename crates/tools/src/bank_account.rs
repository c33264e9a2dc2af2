//! Bank account tool: opens an account for a customer.
//!
//! Input mistakes the customer can fix (a blank name, a malformed ID number,
//! a negative opening balance) come back as `Error: ...` tool output so the
//! agent can ask for a correction. They are not invocation failures.

use async_trait::async_trait;
use flowsmith_core::error::ToolError;
use flowsmith_core::tool::{ParamSpec, ParamType, Tool, ToolArguments, ToolResult};
use serde_json::Value;

pub struct BankAccountTool;

fn is_letters(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphabetic() || c.is_whitespace())
}

fn text_arg<'a>(arguments: &'a ToolArguments, key: &str) -> Option<&'a str> {
    arguments
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// `ACC` + last six characters of the ID (zeros without one) + name length as two digits.
fn account_number(name: &str, id_number: Option<&str>) -> String {
    let digits: String = match id_number {
        Some(id) => {
            let skip = id.chars().count().saturating_sub(6);
            id.chars().skip(skip).collect()
        }
        None => "000000".into(),
    };
    format!("ACC{digits}{:02}", name.chars().count())
}

#[async_trait]
impl Tool for BankAccountTool {
    fn name(&self) -> &str {
        "create_bank_account"
    }

    fn description(&self) -> &str {
        "Create a bank account for a customer. Requires the customer's first name; \
         last name, ID number (6-12 digits) and an opening balance are optional."
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::required("name", ParamType::String, "Customer's first name"),
            ParamSpec::optional("second_name", ParamType::String, "Customer's last name"),
            ParamSpec::optional("id_number", ParamType::String, "Customer's ID number, 6-12 digits"),
            ParamSpec::optional("balance", ParamType::Number, "Opening balance, defaults to 0"),
        ]
    }

    async fn execute(&self, arguments: ToolArguments) -> Result<ToolResult, ToolError> {
        let Some(name) = text_arg(&arguments, "name") else {
            return Ok(ToolResult::rejected("Error: First name is required"));
        };
        if !is_letters(name) {
            return Ok(ToolResult::rejected("Error: First name should contain only letters"));
        }

        let second_name = text_arg(&arguments, "second_name");
        if second_name.is_some_and(|s| !is_letters(s)) {
            return Ok(ToolResult::rejected("Error: Last name should contain only letters"));
        }

        let id_number = text_arg(&arguments, "id_number");
        if let Some(id) = id_number {
            if !(6..=12).contains(&id.len()) || !id.chars().all(|c| c.is_ascii_digit()) {
                return Ok(ToolResult::rejected("Error: ID number should be 6-12 digits"));
            }
        }

        let balance = arguments.get("balance").and_then(Value::as_f64).unwrap_or(0.0);
        if balance < 0.0 {
            return Ok(ToolResult::rejected("Error: Initial balance cannot be negative"));
        }

        let account = account_number(name, id_number);
        let customer = match second_name {
            Some(last) => format!("{name} {last}"),
            None => name.to_string(),
        };

        let mut output = format!(
            "✅ Bank account created successfully!\nAccount Number: {account}\nCustomer: {customer}"
        );
        if let Some(id) = id_number {
            output.push_str(&format!("\nID: {id}"));
        }
        output.push_str(&format!("\nInitial Balance: {balance:.2}"));

        Ok(ToolResult::ok(output).with_data(serde_json::json!({
            "account_number": account,
            "customer": customer,
            "id_number": id_number,
            "balance": balance,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowsmith_core::tool::{ToolCall, ToolRegistry};
    use serde_json::json;

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(BankAccountTool)).unwrap();
        registry
    }

    async fn invoke(args: Value) -> Result<ToolResult, ToolError> {
        registry()
            .invoke(&ToolCall {
                id: "call_create_bank_account".into(),
                name: "create_bank_account".into(),
                arguments: args,
            })
            .await
    }

    #[test]
    fn account_number_format() {
        assert_eq!(account_number("John", Some("123456789")), "ACC45678904");
        assert_eq!(account_number("Ann", None), "ACC00000003");
        assert_eq!(account_number("Zoë", Some("№12345678")), "ACC34567803");
        assert_eq!(account_number("Bo", Some("1234")), "ACC123402");
    }

    #[tokio::test]
    async fn creates_account() {
        let result = invoke(json!({
            "name": "John",
            "second_name": "Smith",
            "id_number": "123456789",
            "balance": 10
        }))
        .await
        .unwrap();
        assert!(result.success);
        assert!(result.output.starts_with("✅ Bank account created successfully!"));
        assert!(result.output.contains("Account Number: ACC45678904"));
        assert!(result.output.contains("Customer: John Smith"));
        assert!(result.output.contains("Initial Balance: 10.00"));
        assert_eq!(result.data.unwrap()["account_number"], "ACC45678904");
    }

    #[tokio::test]
    async fn empty_name_is_tool_output_not_failure() {
        let result = invoke(json!({"name": "", "balance": 10})).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.output, "Error: First name is required");
    }

    #[tokio::test]
    async fn negative_balance_is_rejected() {
        let result = invoke(json!({"name": "John", "balance": -5})).await.unwrap();
        assert!(!result.success);
        assert!(result.output.contains("cannot be negative"));
    }

    #[tokio::test]
    async fn numeric_string_balance_is_coerced() {
        let result = invoke(json!({"name": "John", "balance": "25.5"})).await.unwrap();
        assert!(result.success);
        assert!(result.output.contains("Initial Balance: 25.50"));
    }

    #[tokio::test]
    async fn malformed_id_and_names_are_rejected() {
        let bad_id = invoke(json!({"name": "John", "id_number": "12ab"})).await.unwrap();
        assert_eq!(bad_id.output, "Error: ID number should be 6-12 digits");

        let bad_name = invoke(json!({"name": "J0hn"})).await.unwrap();
        assert_eq!(bad_name.output, "Error: First name should contain only letters");

        let bad_last = invoke(json!({"name": "John", "second_name": "Sm1th"})).await.unwrap();
        assert_eq!(bad_last.output, "Error: Last name should contain only letters");
    }

    #[tokio::test]
    async fn missing_name_and_wrong_balance_type_fail_validation() {
        let err = invoke(json!({"balance": true})).await.unwrap_err();
        let ToolError::InvalidArguments { violations, .. } = err else {
            panic!("expected InvalidArguments");
        };
        let fields: Vec<&str> = violations.iter().map(|v| v.field.as_str()).collect();
        assert_eq!(fields, vec!["name", "balance"]);
    }
}
