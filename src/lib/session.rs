use super::calculator::{Calculator, CalculatorSpec};
use super::prebuilt;

pub const GENERATED_KEY: &str = "generated";

/// The live calculators of one user session, in page order.
#[derive(Debug, Clone)]
pub struct Session {
    generated: Option<Calculator>,
    prebuilt: Vec<(&'static str, Calculator)>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        let prebuilt = prebuilt::KEYS
            .into_iter()
            .zip(prebuilt::all())
            .map(|(key, spec)| (key, Calculator::new(spec)))
            .collect();
        Self {
            generated: None,
            prebuilt,
        }
    }

    /// Replaces the generated calculator with a fresh one.
    pub fn install_generated(&mut self, spec: CalculatorSpec) -> &mut Calculator {
        self.generated.insert(Calculator::new(spec))
    }

    pub fn generated(&self) -> Option<&Calculator> {
        self.generated.as_ref()
    }

    /// Keys in page order: the generated calculator first, when there is one.
    pub fn keys(&self) -> Vec<&'static str> {
        self.generated
            .as_ref()
            .map(|_| GENERATED_KEY)
            .into_iter()
            .chain(self.prebuilt.iter().map(|(key, _)| *key))
            .collect()
    }

    pub fn calculators(&self) -> impl Iterator<Item = (&'static str, &Calculator)> + '_ {
        self.generated
            .iter()
            .map(|c| (GENERATED_KEY, c))
            .chain(self.prebuilt.iter().map(|(key, c)| (*key, c)))
    }

    /// Key of the calculator named by `selector`: a key or a 1-based position in page order.
    pub fn resolve(&self, selector: &str) -> Option<&'static str> {
        let keys = self.keys();
        match selector.trim().parse::<usize>() {
            Ok(position) => keys.get(position.checked_sub(1)?).copied(),
            Err(_) => keys.into_iter().find(|key| *key == selector.trim()),
        }
    }

    pub fn get(&self, selector: &str) -> Option<&Calculator> {
        let key = self.resolve(selector)?;
        self.calculators().find(|(k, _)| *k == key).map(|(_, c)| c)
    }

    pub fn get_mut(&mut self, selector: &str) -> Option<&mut Calculator> {
        let key = self.resolve(selector)?;
        if key == GENERATED_KEY {
            return self.generated.as_mut();
        }
        self.prebuilt
            .iter_mut()
            .find(|(k, _)| *k == key)
            .map(|(_, c)| c)
    }
}
