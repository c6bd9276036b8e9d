use super::calculator::{CalculatorSpec, Values};
use super::field::Field;

/// Keys of the prebuilt calculators, in display order.
pub const KEYS: [&str; 3] = ["tip", "mortgage", "bmi"];

/// Rounds half away from zero at `places` decimals.
fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round() / scale
}

fn input(values: &Values, name: &str) -> f64 {
    values.get(name).copied().unwrap_or(0.0)
}

fn outputs<const N: usize>(pairs: [(&str, f64); N]) -> Values {
    pairs
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

pub fn tip(values: &Values) -> Values {
    let bill = input(values, "bill");
    let tip_amount = bill * input(values, "tipPercentage") / 100.0;
    let total_amount = bill + tip_amount;
    let per_person = total_amount / input(values, "people").max(1.0);
    outputs([
        ("tipAmount", round_to(tip_amount, 2)),
        ("totalAmount", round_to(total_amount, 2)),
        ("perPerson", round_to(per_person, 2)),
    ])
}

pub fn mortgage(values: &Values) -> Values {
    let principal = input(values, "principal");
    let monthly_rate = input(values, "rate") / 100.0 / 12.0;
    let payments = input(values, "years") * 12.0;

    if monthly_rate == 0.0 {
        return outputs([
            ("monthlyPayment", round_to(principal / payments, 2)),
            ("totalInterest", 0.0),
            ("totalPaid", principal),
        ]);
    }

    let growth = (1.0 + monthly_rate).powf(payments);
    let monthly_payment = principal * (monthly_rate * growth) / (growth - 1.0);
    let total_paid = monthly_payment * payments;
    let total_interest = total_paid - principal;
    outputs([
        ("monthlyPayment", round_to(monthly_payment, 2)),
        ("totalInterest", round_to(total_interest, 2)),
        ("totalPaid", round_to(total_paid, 2)),
    ])
}

/// `category` is always `0`: no BMI ranges are defined for it.
pub fn bmi(values: &Values) -> Values {
    let weight = input(values, "weight");
    let height = input(values, "height");
    if weight <= 0.0 || height <= 0.0 {
        return outputs([("bmi", 0.0), ("category", 0.0)]);
    }
    let bmi = weight * 703.0 / (height * height);
    outputs([("bmi", round_to(bmi, 1)), ("category", 0.0)])
}

pub fn tip_calculator() -> CalculatorSpec {
    build(
        "Tip Calculator",
        "Calculate tips and split bills easily",
        vec![
            Field::input("bill", "Bill Amount ($)", 0.0),
            Field::input("tipPercentage", "Tip Percentage (%)", 18.0),
            Field::input("people", "Number of People", 1.0),
            Field::output("tipAmount", "Tip Amount ($)"),
            Field::output("totalAmount", "Total Amount ($)"),
            Field::output("perPerson", "Per Person ($)"),
        ],
    )
    .with_recompute(tip)
}

pub fn mortgage_calculator() -> CalculatorSpec {
    build(
        "Mortgage Calculator",
        "Calculate monthly mortgage payments",
        vec![
            Field::input("principal", "Loan Amount ($)", 0.0),
            Field::input("rate", "Annual Interest Rate (%)", 3.5),
            Field::input("years", "Loan Term (Years)", 30.0),
            Field::output("monthlyPayment", "Monthly Payment ($)"),
            Field::output("totalInterest", "Total Interest ($)"),
            Field::output("totalPaid", "Total Amount Paid ($)"),
        ],
    )
    .with_recompute(mortgage)
}

pub fn bmi_calculator() -> CalculatorSpec {
    build(
        "BMI Calculator",
        "Calculate your Body Mass Index",
        vec![
            Field::input("weight", "Weight (lbs)", 0.0),
            Field::input("height", "Height (inches)", 0.0),
            Field::output("bmi", "BMI"),
            Field::output("category", "Category"),
        ],
    )
    .with_recompute(bmi)
}

fn build(title: &str, description: &str, fields: Vec<Field>) -> CalculatorSpec {
    CalculatorSpec::new(title, Some(description.to_string()), fields)
        .unwrap_or_else(|e| unreachable!("prebuilt calculator `{title}` is invalid: {e}"))
}

pub fn by_key(key: &str) -> Option<CalculatorSpec> {
    match key {
        "tip" => Some(tip_calculator()),
        "mortgage" => Some(mortgage_calculator()),
        "bmi" => Some(bmi_calculator()),
        _ => None,
    }
}

pub fn all() -> Vec<CalculatorSpec> {
    vec![tip_calculator(), mortgage_calculator(), bmi_calculator()]
}
