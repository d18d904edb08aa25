// Edit form state for the telemetry dialog
use crate::domain::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    TelemetryValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    Required,
    Finite,
}

/// Validation rules, checked in order.
pub const VALIDATION_RULES: &[(FormField, Rule)] = &[
    (FormField::TelemetryValue, Rule::Required),
    (FormField::TelemetryValue, Rule::Finite),
];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormState {
    device_name: String,
    telemetry_value: Option<f64>,
    loaded_value: Option<f64>,
}

impl FormState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn telemetry_value(&self) -> Option<f64> {
        self.telemetry_value
    }

    pub fn set_device_name(&mut self, name: impl Into<String>) {
        self.device_name = name.into();
    }

    /// Fill the form from freshly loaded data. Never marks the form dirty.
    pub fn populate(&mut self, device_name: impl Into<String>, value: Option<f64>) {
        self.device_name = device_name.into();
        self.telemetry_value = value;
        self.loaded_value = value;
    }

    /// Apply a user edit of the editable field.
    pub fn edit(&mut self, value: Option<f64>) {
        self.telemetry_value = value;
    }

    /// True when the value differs from the last loaded one.
    pub fn is_dirty(&self) -> bool {
        self.telemetry_value != self.loaded_value
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Run the rule table and return the value that would be written.
    pub fn validate(&self) -> Result<f64, ValidationError> {
        for (field, rule) in VALIDATION_RULES {
            let value = match field {
                FormField::TelemetryValue => self.telemetry_value,
            };
            match (rule, value) {
                (Rule::Required, None) => return Err(ValidationError::Required),
                (Rule::Finite, Some(v)) if !v.is_finite() => return Err(ValidationError::NotFinite),
                _ => {}
            }
        }
        self.telemetry_value.ok_or(ValidationError::Required)
    }

    /// Validated value, provided the form is also dirty.
    pub fn submittable_value(&self) -> Result<f64, ValidationError> {
        let value = self.validate()?;
        if !self.is_dirty() {
            return Err(ValidationError::Unchanged);
        }
        Ok(value)
    }

    pub fn can_submit(&self) -> bool {
        self.submittable_value().is_ok()
    }
}
