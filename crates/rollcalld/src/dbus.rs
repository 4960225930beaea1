//! D-Bus surface for the rollcall daemon.
//!
//! Bus name: org.rollcall.Attendance1
//! Object path: /org/rollcall/Attendance1
//!
//! Structured payloads (probes, responses) travel as JSON strings; ids and
//! dates travel as plain strings and are validated here, before the
//! service layer sees them.

use crate::authz::{Caller, Role};
use crate::engine::EngineError;
use crate::service::{AttendanceService, ServiceError};
use chrono::NaiveDate;
use rollcall_core::Embedding;
use uuid::Uuid;
use zbus::interface;

pub struct AttendanceInterface {
    service: AttendanceService,
}

impl AttendanceInterface {
    pub fn new(service: AttendanceService) -> Self {
        Self { service }
    }
}

#[interface(name = "org.rollcall.Attendance1")]
impl AttendanceInterface {
    /// Identify the calling student for a course; records attendance when
    /// a session is active. `probe` is a JSON array of f32.
    async fn identify(
        &self,
        course_id: &str,
        caller_id: &str,
        caller_role: &str,
        probe: &str,
    ) -> zbus::fdo::Result<String> {
        let course_id = parse_uuid(course_id)?;
        let caller = parse_caller(caller_id, caller_role)?;
        let probe = parse_probe(probe)?;
        tracing::info!(course = %course_id, caller = %caller.id, "identify requested");

        let response = self
            .service
            .identify(course_id, probe, caller)
            .await
            .map_err(to_fdo)?;
        encode(&response)
    }

    /// Group attendance from a set of probes, one entry per probe.
    /// `probes` is a JSON array of f32 arrays.
    async fn batch_identify(
        &self,
        course_id: &str,
        caller_id: &str,
        caller_role: &str,
        probes: &str,
    ) -> zbus::fdo::Result<String> {
        let course_id = parse_uuid(course_id)?;
        let caller = parse_caller(caller_id, caller_role)?;
        let probes = parse_probes(probes)?;
        tracing::info!(
            course = %course_id,
            caller = %caller.id,
            probes = probes.len(),
            "batch identify requested"
        );

        let entries = self
            .service
            .batch_identify(course_id, probes, caller)
            .await
            .map_err(to_fdo)?;
        encode(&entries)
    }

    /// Cancel a course's session for a date (YYYY-MM-DD). Returns the
    /// number of enrollees marked cancelled.
    async fn cancel_session(
        &self,
        course_id: &str,
        date: &str,
        caller_id: &str,
        caller_role: &str,
    ) -> zbus::fdo::Result<u32> {
        let course_id = parse_uuid(course_id)?;
        let date = parse_date(date)?;
        let caller = parse_caller(caller_id, caller_role)?;
        tracing::info!(course = %course_id, %date, caller = %caller.id, "cancel requested");

        let cancelled = self
            .service
            .cancel_session(course_id, date, caller)
            .await
            .map_err(to_fdo)?;
        Ok(cancelled as u32)
    }

    /// Select courses for a student. `course_ids` is a JSON array of
    /// uuid strings; returns the created pending enrollments.
    async fn select_courses(
        &self,
        student_id: &str,
        course_ids: &str,
        caller_id: &str,
        caller_role: &str,
    ) -> zbus::fdo::Result<String> {
        let student_id = parse_uuid(student_id)?;
        let caller = parse_caller(caller_id, caller_role)?;
        let ids: Vec<String> = serde_json::from_str(course_ids)
            .map_err(|e| zbus::fdo::Error::InvalidArgs(format!("bad course_ids: {e}")))?;
        let course_ids = ids
            .iter()
            .map(|id| parse_uuid(id))
            .collect::<Result<Vec<_>, _>>()?;
        tracing::info!(student = %student_id, courses = course_ids.len(), "selection requested");

        let created = self
            .service
            .select_courses(student_id, course_ids, caller)
            .await
            .map_err(to_fdo)?;
        encode(&created)
    }

    /// Approve or reject a pending enrollment; returns the updated record.
    async fn review_enrollment(
        &self,
        enrollment_id: &str,
        approve: bool,
        caller_id: &str,
        caller_role: &str,
    ) -> zbus::fdo::Result<String> {
        let enrollment_id = parse_uuid(enrollment_id)?;
        let caller = parse_caller(caller_id, caller_role)?;
        tracing::info!(enrollment = %enrollment_id, approve, "review requested");

        let reviewed = self
            .service
            .review_enrollment(enrollment_id, approve, caller)
            .await
            .map_err(to_fdo)?;
        encode(&reviewed)
    }

    /// Daemon status information.
    async fn status(&self) -> zbus::fdo::Result<String> {
        Ok(serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "tolerance": self.service.tolerance(),
        })
        .to_string())
    }
}

fn parse_uuid(text: &str) -> zbus::fdo::Result<Uuid> {
    Uuid::parse_str(text).map_err(|e| zbus::fdo::Error::InvalidArgs(format!("bad uuid: {e}")))
}

fn parse_date(text: &str) -> zbus::fdo::Result<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .map_err(|e| zbus::fdo::Error::InvalidArgs(format!("bad date: {e}")))
}

fn parse_caller(id: &str, role: &str) -> zbus::fdo::Result<Caller> {
    let id = parse_uuid(id)?;
    let role: Role = role
        .parse()
        .map_err(|e| zbus::fdo::Error::InvalidArgs(format!("bad role: {e}")))?;
    Ok(Caller { id, role })
}

fn parse_probe(text: &str) -> zbus::fdo::Result<Embedding> {
    let values: Vec<f32> = serde_json::from_str(text)
        .map_err(|e| zbus::fdo::Error::InvalidArgs(format!("bad probe: {e}")))?;
    Ok(Embedding::new(values))
}

fn parse_probes(text: &str) -> zbus::fdo::Result<Vec<Embedding>> {
    let values: Vec<Vec<f32>> = serde_json::from_str(text)
        .map_err(|e| zbus::fdo::Error::InvalidArgs(format!("bad probes: {e}")))?;
    Ok(values.into_iter().map(Embedding::new).collect())
}

fn encode<T: serde::Serialize>(value: &T) -> zbus::fdo::Result<String> {
    serde_json::to_string(value).map_err(|e| zbus::fdo::Error::Failed(e.to_string()))
}

fn to_fdo(err: ServiceError) -> zbus::fdo::Error {
    match err {
        ServiceError::Forbidden(_) => zbus::fdo::Error::AccessDenied(err.to_string()),
        ServiceError::InvalidProbe => zbus::fdo::Error::InvalidArgs(err.to_string()),
        ServiceError::CourseNotFound(_)
        | ServiceError::EnrollmentNotFound(_)
        | ServiceError::NoApprovedEnrollees(_)
        | ServiceError::Conflict(_)
        | ServiceError::NoMatch
        | ServiceError::SessionNotActive => zbus::fdo::Error::Failed(err.to_string()),
        ServiceError::Store(_) | ServiceError::Engine(_) => {
            tracing::error!(%err, "internal failure serving request");
            zbus::fdo::Error::Failed("internal error".to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_probe() {
        let probe = parse_probe("[0.5, -1.0, 2.0]").unwrap();
        assert_eq!(probe.values, vec![0.5, -1.0, 2.0]);
        assert!(parse_probe("not json").is_err());
    }

    #[test]
    fn test_parse_date() {
        assert!(parse_date("2025-01-06").is_ok());
        assert!(parse_date("06/01/2025").is_err());
    }

    #[test]
    fn test_forbidden_maps_to_access_denied() {
        let err = to_fdo(ServiceError::Forbidden("nope".to_string()));
        assert!(matches!(err, zbus::fdo::Error::AccessDenied(_)));
    }

    #[test]
    fn test_internal_errors_are_opaque() {
        let err = to_fdo(ServiceError::Engine(EngineError::ChannelClosed));
        match err {
            zbus::fdo::Error::Failed(msg) => assert_eq!(msg, "internal error"),
            other => panic!("expected Failed, got {other:?}"),
        }
    }
}
