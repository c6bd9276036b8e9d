use super::completion_api::MessageOut;

const SYSTEM_MESSAGE: &str = r#"You are a calculator generator for CalcNest. Create a calculator based on the user's description.

Return a JSON object with this exact structure:
{
  "title": "Calculator Name",
  "description": "Brief description of what it calculates",
  "fields": [
    { "name": "input1", "label": "Input Label", "value": 0, "readonly": false },
    { "name": "output1", "label": "Output Label", "value": 0, "readonly": true }
  ],
  "calculateFunction": "return { output1: values.input1 * 2 };"
}

Rules:
1. Input fields have readonly: false, output fields have readonly: true
2. The calculateFunction is the body of a function of one parameter `values` and returns an object with the calculated results keyed by output field name
3. The calculateFunction may only use: const/let declarations, if/else, return, arithmetic and comparison operators, the ternary operator, && and ||, object literals, Math functions and constants, isFinite, isNaN, parseFloat, Number and toFixed. No loops, strings, arrays or other functions
4. All calculations should handle edge cases (division by zero, negative numbers, etc.)
5. Use clear, descriptive field names and labels
6. Include appropriate default values
7. Keep calculations accurate and practical

Example for "tip calculator":
{
  "title": "Tip Calculator",
  "description": "Calculate tips and total bill amount",
  "fields": [
    { "name": "bill", "label": "Bill Amount ($)", "value": 0, "readonly": false },
    { "name": "tipPercent", "label": "Tip Percentage (%)", "value": 18, "readonly": false },
    { "name": "tipAmount", "label": "Tip Amount ($)", "value": 0, "readonly": true },
    { "name": "total", "label": "Total Amount ($)", "value": 0, "readonly": true }
  ],
  "calculateFunction": "const tipAmount = (values.bill * values.tipPercent) / 100; const total = values.bill + tipAmount; return { tipAmount: Math.round(tipAmount * 100) / 100, total: Math.round(total * 100) / 100 };"
}"#;

#[derive(Debug, Clone)]
pub struct Prompt {
    system_message: String,
    user_message: String,
}

impl Prompt {
    pub fn for_calculator(description: &str) -> Self {
        Self {
            system_message: SYSTEM_MESSAGE.to_string(),
            user_message: description.to_string(),
        }
    }

    pub fn to_llm_messages(&self) -> Vec<MessageOut> {
        vec![
            MessageOut::new_system(self.system_message.clone()),
            MessageOut::new_user(self.user_message.clone()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lib::generator::GeneratedCalculatorSpec;
    use crate::lib::loader;

    #[test]
    fn example_in_the_system_message_loads() {
        let start = SYSTEM_MESSAGE.rfind("\n{").unwrap();
        let example: GeneratedCalculatorSpec =
            serde_json::from_str(&SYSTEM_MESSAGE[start..]).unwrap();
        let spec = loader::load(example).unwrap();
        assert_eq!(spec.title(), "Tip Calculator");
        assert!(spec.has_recompute());
    }
    #[test]
    fn messages() {
        let messages = Prompt::for_calculator("BMI calculator using height and weight").to_llm_messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1], MessageOut::new_user("BMI calculator using height and weight".to_string()));
    }
}
