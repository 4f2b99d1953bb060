use crate::limits::*;
use crate::model::*;

use super::StoreError;

fn check_len(value: &str, max: usize, what: &'static str) -> Result<(), StoreError> {
    if value.len() > max {
        return Err(StoreError::LimitExceeded(what));
    }
    Ok(())
}

fn check_opt_len(value: &Option<String>, max: usize, what: &'static str) -> Result<(), StoreError> {
    match value {
        Some(v) => check_len(v, max, what),
        None => Ok(()),
    }
}

pub(super) fn validate_rule(rule: &RecurringRule) -> Result<(), StoreError> {
    if rule.title.trim().is_empty() {
        return Err(StoreError::Invalid("title is required"));
    }
    check_len(&rule.title, MAX_NAME_LEN, "title too long")?;
    check_opt_len(&rule.description, MAX_TEXT_LEN, "description too long")?;
    if rule.day_of_week > 6 {
        return Err(StoreError::Invalid("day_of_week must be within 0..=6"));
    }
    if rule.time_start >= rule.time_end {
        return Err(StoreError::Invalid("time_start must be before time_end"));
    }
    match rule.total_lessons {
        Some(0) => return Err(StoreError::Invalid("total_lessons must be positive")),
        Some(_) if rule.starts_on.is_none() => {
            return Err(StoreError::Invalid("total_lessons requires starts_on"));
        }
        _ => {}
    }
    if rule.reserved_spots > rule.capacity {
        tracing::warn!(
            rule = %rule.id,
            reserved = rule.reserved_spots,
            capacity = rule.capacity,
            "reserved spots exceed capacity"
        );
    }
    Ok(())
}

pub(super) fn validate_session(session: &Session) -> Result<(), StoreError> {
    if session.title.trim().is_empty() {
        return Err(StoreError::Invalid("title is required"));
    }
    check_len(&session.title, MAX_NAME_LEN, "title too long")?;
    check_opt_len(&session.description, MAX_TEXT_LEN, "description too long")?;
    if session.time_start >= session.time_end {
        return Err(StoreError::Invalid("time_start must be before time_end"));
    }
    if session.reserved_spots > session.capacity {
        tracing::warn!(
            session = %session.id,
            reserved = session.reserved_spots,
            capacity = session.capacity,
            "reserved spots exceed capacity"
        );
    }
    Ok(())
}

pub(super) fn validate_instance(instance: &Instance) -> Result<(), StoreError> {
    check_opt_len(&instance.note, MAX_TEXT_LEN, "note too long")
}

/// Backstop for whatever the booking flow let through.
pub(super) fn validate_participant(p: &Participant) -> Result<(), StoreError> {
    if p.name.trim().is_empty() || p.email.trim().is_empty() {
        return Err(StoreError::Invalid("name and email are required"));
    }
    check_len(&p.name, MAX_NAME_LEN, "name too long")?;
    check_len(&p.email, MAX_EMAIL_LEN, "email too long")?;
    check_opt_len(&p.phone, MAX_PHONE_LEN, "phone too long")?;
    check_opt_len(&p.note, MAX_TEXT_LEN, "note too long")
}

pub(super) fn validate_message(m: &ContactMessage) -> Result<(), StoreError> {
    if m.name.trim().is_empty() || m.email.trim().is_empty() || m.body.trim().is_empty() {
        return Err(StoreError::Invalid("name, email and message are required"));
    }
    check_len(&m.name, MAX_NAME_LEN, "name too long")?;
    check_len(&m.email, MAX_EMAIL_LEN, "email too long")?;
    check_len(&m.body, MAX_TEXT_LEN, "message too long")
}
