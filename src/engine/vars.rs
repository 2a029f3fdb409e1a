//! Variable and array storage behind the inspector

use std::collections::BTreeMap;

use super::{Binding, Value, ValueType};
use crate::error::BindingError;

#[derive(Clone, Debug, PartialEq)]
struct ArrayVar {
    dimensions: Vec<u16>,
    values: Vec<Value>,
}

impl ArrayVar {
    /// Row-major offset of an element. Subscripts run from 0 to the
    /// dimension bound inclusive.
    fn offset(&self, subscripts: &[u16]) -> Option<usize> {
        if subscripts.len() != self.dimensions.len() {
            return None;
        }
        self.dimensions
            .iter()
            .zip(subscripts)
            .try_fold(0usize, |acc, (&bound, &sub)| {
                (sub <= bound).then(|| acc * (bound as usize + 1) + sub as usize)
            })
    }
}

/// Scalars and arrays keyed by name
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VarStore {
    vars: BTreeMap<String, Value>,
    arrays: BTreeMap<String, ArrayVar>,
}

impl VarStore {
    /// Scalars first, then arrays, each in name order
    pub fn bindings(&self) -> Vec<Binding> {
        let vars = self.vars.keys().map(|name| Binding::Var { name: name.clone() });
        let arrays = self.arrays.iter().map(|(name, array)| Binding::Array {
            name: name.clone(),
            dimensions: array.dimensions.clone(),
        });
        vars.chain(arrays).collect()
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.vars.get(name).cloned()
    }

    /// Assign a scalar, creating it on first use
    pub fn assign(&mut self, name: &str, value: Value) -> Result<(), BindingError> {
        if ValueType::of_name(name) != value.value_type() {
            return Err(BindingError::TypeMismatch(name.to_string()));
        }
        self.vars.insert(name.to_string(), value);
        Ok(())
    }

    /// Overwrite a scalar that already exists
    pub fn modify(&mut self, name: &str, value: Value) -> Result<(), BindingError> {
        let slot = self
            .vars
            .get_mut(name)
            .ok_or_else(|| BindingError::Unknown(name.to_string()))?;
        if slot.value_type() != value.value_type() {
            return Err(BindingError::TypeMismatch(name.to_string()));
        }
        *slot = value;
        Ok(())
    }

    /// Create an array of zero values. False if `name` is already dimensioned.
    pub fn dim(&mut self, name: &str, dimensions: Vec<u16>) -> bool {
        if self.arrays.contains_key(name) {
            return false;
        }
        let len = dimensions.iter().map(|&d| d as usize + 1).product();
        let values = vec![Value::zero(ValueType::of_name(name)); len];
        self.arrays.insert(name.to_string(), ArrayVar { dimensions, values });
        true
    }

    pub fn element(&self, name: &str, subscripts: &[u16]) -> Option<Value> {
        let array = self.arrays.get(name)?;
        array.offset(subscripts).map(|i| array.values[i].clone())
    }

    pub fn set_element(&mut self, name: &str, subscripts: &[u16], value: Value) -> Result<(), BindingError> {
        let array = self
            .arrays
            .get_mut(name)
            .ok_or_else(|| BindingError::Unknown(name.to_string()))?;
        if ValueType::of_name(name) != value.value_type() {
            return Err(BindingError::TypeMismatch(name.to_string()));
        }
        let i = array
            .offset(subscripts)
            .ok_or_else(|| BindingError::SubscriptOutOfRange(name.to_string()))?;
        array.values[i] = value;
        Ok(())
    }
}
