use std::ops::RangeInclusive;

use crate::models::{Prescription, RecordError, Vitals};

pub const PULSE_RANGE: RangeInclusive<u32> = 20..=250;
pub const TEMPERATURE_RANGE: RangeInclusive<f64> = 30.0..=45.0;
pub const SPO2_RANGE: RangeInclusive<u32> = 0..=100;
pub const RESPIRATORY_RATE_RANGE: RangeInclusive<u32> = 4..=60;
pub const WEIGHT_RANGE: RangeInclusive<f64> = 0.0..=500.0;

/// Parses `systolic/diastolic` in mmHg.
pub fn parse_blood_pressure(raw: &str) -> Result<(u32, u32), RecordError> {
    let invalid = || {
        RecordError::ValidationError(format!(
            "Blood pressure must look like 120/80, got '{}'",
            raw
        ))
    };

    let (systolic, diastolic) = raw.trim().split_once('/').ok_or_else(invalid)?;
    let systolic: u32 = systolic.trim().parse().map_err(|_| invalid())?;
    let diastolic: u32 = diastolic.trim().parse().map_err(|_| invalid())?;

    if systolic <= diastolic {
        return Err(RecordError::ValidationError(
            "Systolic pressure must be greater than diastolic".to_string(),
        ));
    }

    Ok((systolic, diastolic))
}

pub fn validate_vitals(vitals: &Vitals) -> Result<(), RecordError> {
    if let Some(bp) = &vitals.blood_pressure {
        parse_blood_pressure(bp)?;
    }
    check("Pulse", vitals.pulse, &PULSE_RANGE, "bpm")?;
    check("Temperature", vitals.temperature, &TEMPERATURE_RANGE, "°C")?;
    check("SpO2", vitals.spo2, &SPO2_RANGE, "%")?;
    check(
        "Respiratory rate",
        vitals.respiratory_rate,
        &RESPIRATORY_RATE_RANGE,
        "breaths/min",
    )?;
    check("Weight", vitals.weight, &WEIGHT_RANGE, "kg")?;
    Ok(())
}

pub fn validate_prescriptions(prescriptions: &[Prescription]) -> Result<(), RecordError> {
    for (index, prescription) in prescriptions.iter().enumerate() {
        if prescription.medicine.trim().is_empty() {
            return Err(RecordError::ValidationError(format!(
                "Prescription {} is missing a medicine name",
                index + 1
            )));
        }
        if prescription.dosage.trim().is_empty() {
            return Err(RecordError::ValidationError(format!(
                "Prescription {} ({}) is missing a dosage",
                index + 1,
                prescription.medicine.trim()
            )));
        }
        if prescription.duration_days == Some(0) {
            return Err(RecordError::ValidationError(format!(
                "Prescription {} ({}) must last at least one day",
                index + 1,
                prescription.medicine.trim()
            )));
        }
    }
    Ok(())
}

fn check<T>(
    name: &str,
    value: Option<T>,
    range: &RangeInclusive<T>,
    unit: &str,
) -> Result<(), RecordError>
where
    T: PartialOrd + std::fmt::Display,
{
    match value {
        Some(v) if !range.contains(&v) => Err(RecordError::ValidationError(format!(
            "{} must be between {} and {} {}, got {}",
            name,
            range.start(),
            range.end(),
            unit,
            v
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn normal() -> Vitals {
        Vitals {
            blood_pressure: Some("120/80".to_string()),
            pulse: Some(72),
            temperature: Some(36.8),
            spo2: Some(98),
            respiratory_rate: Some(16),
            weight: Some(70.5),
        }
    }

    #[test]
    fn normal_vitals_pass() {
        assert!(validate_vitals(&normal()).is_ok());
        assert!(validate_vitals(&Vitals::default()).is_ok());
    }

    #[test]
    fn blood_pressure_needs_both_numbers_in_order() {
        assert_eq!(parse_blood_pressure(" 135 / 85 ").unwrap(), (135, 85));
        assert_matches!(parse_blood_pressure("120"), Err(RecordError::ValidationError(_)));
        assert_matches!(parse_blood_pressure("80/120"), Err(RecordError::ValidationError(_)));
        assert_matches!(parse_blood_pressure("abc/80"), Err(RecordError::ValidationError(_)));
    }

    #[test]
    fn out_of_range_values_are_named() {
        let vitals = Vitals {
            temperature: Some(47.5),
            ..normal()
        };
        assert_matches!(
            validate_vitals(&vitals),
            Err(RecordError::ValidationError(msg)) if msg.starts_with("Temperature")
        );

        let vitals = Vitals {
            pulse: Some(12),
            ..normal()
        };
        assert_matches!(
            validate_vitals(&vitals),
            Err(RecordError::ValidationError(msg)) if msg.starts_with("Pulse")
        );
    }

    #[test]
    fn range_bounds_are_inclusive() {
        let vitals = Vitals {
            pulse: Some(250),
            spo2: Some(100),
            respiratory_rate: Some(4),
            weight: Some(0.0),
            ..normal()
        };
        assert!(validate_vitals(&vitals).is_ok());
    }

    #[test]
    fn prescriptions_need_medicine_and_dosage() {
        let mut rx = Prescription {
            medicine: "Paracetamol".to_string(),
            dosage: "".to_string(),
            frequency: None,
            duration_days: Some(3),
            instructions: None,
        };
        assert_matches!(
            validate_prescriptions(std::slice::from_ref(&rx)),
            Err(RecordError::ValidationError(msg)) if msg.contains("dosage")
        );

        rx.dosage = "500mg".to_string();
        assert!(validate_prescriptions(&[rx]).is_ok());
    }
}
