//! Orchestration of the identification flow: matcher → schedule resolver →
//! ledger → rate recompute, plus session cancellation and the
//! conflict-gated course selection surface.

use crate::authz::{self, Action, Caller};
use crate::engine::{EngineError, EngineHandle};
use chrono::{Local, NaiveDate, NaiveDateTime};
use rollcall_core::performance::attendance_rate;
use rollcall_core::schedule::{resolve_session, SessionState};
use rollcall_core::types::{Approval, Enrollment};
use rollcall_core::Embedding;
use rollcall_store::{MarkOutcome, SelectionOutcome, Store, StoreError};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("course not found: {0}")]
    CourseNotFound(Uuid),
    #[error("enrollment not found: {0}")]
    EnrollmentNotFound(Uuid),
    #[error("course {0} has no approved enrollees")]
    NoApprovedEnrollees(Uuid),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("probe carries no embedding data")]
    InvalidProbe,
    #[error("no enrolled embedding within tolerance of the probe")]
    NoMatch,
    #[error("course has no active session at this time")]
    SessionNotActive,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

#[derive(Debug, Serialize)]
pub struct IdentifyResponse {
    pub student_id: Uuid,
    pub session: SessionState,
    /// What the ledger write did; `None` when no session was active.
    pub attendance: Option<MarkOutcome>,
    /// Recomputed rate; `None` when nothing was recomputed.
    pub attendance_rate: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchOutcome {
    Marked(MarkOutcome),
    NoMatch,
    InvalidProbe,
}

#[derive(Debug, Serialize)]
pub struct BatchEntry {
    pub student_id: Option<Uuid>,
    pub outcome: BatchOutcome,
}

#[derive(Clone)]
pub struct AttendanceService {
    store: Store,
    engine: EngineHandle,
    tolerance: f32,
}

impl AttendanceService {
    pub fn new(store: Store, engine: EngineHandle, tolerance: f32) -> Self {
        Self {
            store,
            engine,
            tolerance,
        }
    }

    pub fn tolerance(&self) -> f32 {
        self.tolerance
    }

    /// Identify the calling student for a course and, if a session is
    /// active right now, record attendance.
    pub async fn identify(
        &self,
        course_id: Uuid,
        probe: Embedding,
        caller: Caller,
    ) -> Result<IdentifyResponse, ServiceError> {
        self.identify_at(course_id, probe, caller, Local::now().naive_local())
            .await
    }

    pub async fn identify_at(
        &self,
        course_id: Uuid,
        probe: Embedding,
        caller: Caller,
        now: NaiveDateTime,
    ) -> Result<IdentifyResponse, ServiceError> {
        require(caller, Action::Identify)?;
        if probe.is_empty() {
            return Err(ServiceError::InvalidProbe);
        }
        self.store
            .course(course_id)
            .await?
            .ok_or(ServiceError::CourseNotFound(course_id))?;

        let gallery = self.store.gallery().await?;
        let hit = self
            .engine
            .identify(probe, gallery, self.tolerance)
            .await?
            .ok_or(ServiceError::NoMatch)?;

        // The matched identity must be the caller's own.
        if hit.student_id != caller.id {
            return Err(ServiceError::Forbidden(
                "identified face does not belong to the caller".to_string(),
            ));
        }

        let entries = self.store.schedule_for_course(course_id).await?;
        let session = resolve_session(&entries, now);

        let (attendance, rate) = if session.is_active() {
            let outcome = self
                .store
                .mark_present(hit.student_id, course_id, now.date())
                .await?;
            let rate = match outcome {
                MarkOutcome::SessionCancelled => None,
                _ => Some(self.recompute_rate(hit.student_id, course_id).await?),
            };
            (Some(outcome), rate)
        } else {
            (None, None)
        };

        tracing::info!(
            student = %hit.student_id,
            course = %course_id,
            distance = hit.distance,
            active = session.is_active(),
            outcome = ?attendance,
            "identification processed"
        );

        Ok(IdentifyResponse {
            student_id: hit.student_id,
            session,
            attendance,
            attendance_rate: rate,
        })
    }

    /// Photo-based group attendance: every probe is matched and
    /// ledger-mutated independently. Duplicates within one date are
    /// reported as already present, never re-created.
    pub async fn batch_identify(
        &self,
        course_id: Uuid,
        probes: Vec<Embedding>,
        caller: Caller,
    ) -> Result<Vec<BatchEntry>, ServiceError> {
        self.batch_identify_at(course_id, probes, caller, Local::now().naive_local())
            .await
    }

    pub async fn batch_identify_at(
        &self,
        course_id: Uuid,
        probes: Vec<Embedding>,
        caller: Caller,
        now: NaiveDateTime,
    ) -> Result<Vec<BatchEntry>, ServiceError> {
        require(caller, Action::BatchIdentify)?;
        let course = self
            .store
            .course(course_id)
            .await?
            .ok_or(ServiceError::CourseNotFound(course_id))?;
        if course.academician_id != Some(caller.id) {
            return Err(ServiceError::Forbidden(
                "course does not belong to the caller".to_string(),
            ));
        }

        let entries = self.store.schedule_for_course(course_id).await?;
        if !resolve_session(&entries, now).is_active() {
            return Err(ServiceError::SessionNotActive);
        }

        let gallery = self.store.gallery().await?;
        let mut results = Vec::with_capacity(probes.len());
        for probe in probes {
            if probe.is_empty() {
                results.push(BatchEntry {
                    student_id: None,
                    outcome: BatchOutcome::InvalidProbe,
                });
                continue;
            }
            let hit = self
                .engine
                .identify(probe, gallery.clone(), self.tolerance)
                .await?;
            let entry = match hit {
                None => BatchEntry {
                    student_id: None,
                    outcome: BatchOutcome::NoMatch,
                },
                Some(hit) => {
                    let outcome = self
                        .store
                        .mark_present(hit.student_id, course_id, now.date())
                        .await?;
                    if outcome != MarkOutcome::SessionCancelled {
                        self.recompute_rate(hit.student_id, course_id).await?;
                    }
                    BatchEntry {
                        student_id: Some(hit.student_id),
                        outcome: BatchOutcome::Marked(outcome),
                    }
                }
            };
            results.push(entry);
        }
        Ok(results)
    }

    /// Cancel a course's session for a date: every approved enrollee's row
    /// becomes cancelled. Restricted to the course's academician. Returns
    /// the number of rows written.
    pub async fn cancel_session(
        &self,
        course_id: Uuid,
        date: NaiveDate,
        caller: Caller,
    ) -> Result<usize, ServiceError> {
        require(caller, Action::CancelSession)?;
        let course = self
            .store
            .course(course_id)
            .await?
            .ok_or(ServiceError::CourseNotFound(course_id))?;
        if course.academician_id != Some(caller.id) {
            return Err(ServiceError::Forbidden(
                "course does not belong to the caller".to_string(),
            ));
        }

        let students = self.store.approved_students(course_id).await?;
        if students.is_empty() {
            return Err(ServiceError::NoApprovedEnrollees(course_id));
        }
        Ok(self.store.cancel_day(course_id, date, students).await?)
    }

    /// Conflict-gated course selection; students select only for themselves.
    pub async fn select_courses(
        &self,
        student_id: Uuid,
        course_ids: Vec<Uuid>,
        caller: Caller,
    ) -> Result<Vec<Enrollment>, ServiceError> {
        require(caller, Action::SelectCourses)?;
        if caller.id != student_id {
            return Err(ServiceError::Forbidden(
                "students may only select courses for themselves".to_string(),
            ));
        }
        match self.store.select_courses(student_id, course_ids).await? {
            SelectionOutcome::Created(created) => Ok(created),
            SelectionOutcome::MissingCourse(id) => Err(ServiceError::CourseNotFound(id)),
            SelectionOutcome::AlreadySelected(id) => Err(ServiceError::Conflict(format!(
                "course {id} is already selected"
            ))),
            SelectionOutcome::Conflict { message, .. } => Err(ServiceError::Conflict(message)),
        }
    }

    /// Approve or reject a pending enrollment; restricted to the course's
    /// academician.
    pub async fn review_enrollment(
        &self,
        enrollment_id: Uuid,
        approve: bool,
        caller: Caller,
    ) -> Result<Enrollment, ServiceError> {
        require(caller, Action::ReviewEnrollment)?;
        let enrollment = self
            .store
            .enrollment(enrollment_id)
            .await?
            .ok_or(ServiceError::EnrollmentNotFound(enrollment_id))?;
        let course = self
            .store
            .course(enrollment.course_id)
            .await?
            .ok_or(ServiceError::CourseNotFound(enrollment.course_id))?;
        if course.academician_id != Some(caller.id) {
            return Err(ServiceError::Forbidden(
                "enrollment belongs to another academician's course".to_string(),
            ));
        }

        let approval = if approve {
            Approval::Approved
        } else {
            Approval::Rejected
        };
        self.store.set_approval(enrollment_id, approval).await?;
        Ok(Enrollment {
            approval,
            ..enrollment
        })
    }

    async fn recompute_rate(&self, student_id: Uuid, course_id: Uuid) -> Result<f64, ServiceError> {
        let records = self.store.records_for(student_id, course_id).await?;
        let rate = attendance_rate(&records);
        self.store.upsert_rate(student_id, course_id, rate).await?;
        Ok(rate)
    }
}

fn require(caller: Caller, action: Action) -> Result<(), ServiceError> {
    if authz::allowed(caller.role, action) {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(format!(
            "{:?} role is not permitted to perform {:?}",
            caller.role, action
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::Role;
    use crate::engine::spawn_engine;
    use chrono::{NaiveDate, NaiveTime};
    use rollcall_core::schedule::{ScheduleEntry, Weekday};
    use rollcall_core::types::Course;
    use rollcall_core::DEFAULT_TOLERANCE;

    fn uuid(n: u8) -> Uuid {
        Uuid::from_bytes([n; 16])
    }

    fn student_caller(id: Uuid) -> Caller {
        Caller {
            id,
            role: Role::Student,
        }
    }

    fn academician_caller(id: Uuid) -> Caller {
        Caller {
            id,
            role: Role::Academician,
        }
    }

    // 2025-01-06 is a Monday; the seeded session runs 10:00-11:00.
    fn during_session() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 6)
            .unwrap()
            .and_time(NaiveTime::from_hms_opt(10, 30, 0).unwrap())
    }

    fn after_session() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 6)
            .unwrap()
            .and_time(NaiveTime::from_hms_opt(12, 0, 0).unwrap())
    }

    async fn service_with_course(academician: Uuid) -> (AttendanceService, Uuid) {
        let store = Store::open_in_memory().await.unwrap();
        let course_id = uuid(100);
        store
            .add_course(Course {
                id: course_id,
                name: "Algorithms".to_string(),
                code: "CSE-301".to_string(),
                academician_id: Some(academician),
            })
            .await
            .unwrap();
        store
            .add_schedule_entry(
                ScheduleEntry::new(
                    course_id,
                    Weekday::Monday,
                    NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
                    NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
                    None,
                )
                .unwrap(),
            )
            .await
            .unwrap();
        let service = AttendanceService::new(store, spawn_engine(4).unwrap(), DEFAULT_TOLERANCE);
        (service, course_id)
    }

    async fn enroll_with_face(service: &AttendanceService, student: Uuid, course: Uuid) {
        service
            .store
            .add_enrollment(Enrollment {
                id: Uuid::new_v4(),
                student_id: student,
                course_id: course,
                approval: Approval::Approved,
            })
            .await
            .unwrap();
        service
            .store
            .add_embedding(student, &Embedding::new(vec![1.0, 0.0, 0.0]))
            .await
            .unwrap();
    }

    fn close_probe() -> Embedding {
        Embedding::new(vec![1.0, 0.1, 0.0])
    }

    fn far_probe() -> Embedding {
        Embedding::new(vec![5.0, 5.0, 5.0])
    }

    #[tokio::test]
    async fn test_identify_creates_attendance_and_rate() {
        let student = uuid(1);
        let (service, course) = service_with_course(uuid(50)).await;
        enroll_with_face(&service, student, course).await;

        let response = service
            .identify_at(course, close_probe(), student_caller(student), during_session())
            .await
            .unwrap();

        assert_eq!(response.student_id, student);
        assert!(response.session.is_active());
        assert_eq!(response.attendance, Some(MarkOutcome::Created));
        assert_eq!(response.attendance_rate, Some(1.0));

        let record = service.store.performance(student, course).await.unwrap();
        assert!((record.unwrap().attendance_rate - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_identify_is_idempotent() {
        let student = uuid(1);
        let (service, course) = service_with_course(uuid(50)).await;
        enroll_with_face(&service, student, course).await;

        service
            .identify_at(course, close_probe(), student_caller(student), during_session())
            .await
            .unwrap();
        let second = service
            .identify_at(course, close_probe(), student_caller(student), during_session())
            .await
            .unwrap();

        assert_eq!(second.attendance, Some(MarkOutcome::AlreadyPresent));
        assert_eq!(second.attendance_rate, Some(1.0));
    }

    #[tokio::test]
    async fn test_identify_outside_session_leaves_ledger_alone() {
        let student = uuid(1);
        let (service, course) = service_with_course(uuid(50)).await;
        enroll_with_face(&service, student, course).await;

        let response = service
            .identify_at(course, close_probe(), student_caller(student), after_session())
            .await
            .unwrap();

        assert!(matches!(response.session, SessionState::Ended(_)));
        assert!(response.attendance.is_none());
        assert!(response.attendance_rate.is_none());
        assert!(service
            .store
            .records_for(student, course)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_identify_rejects_foreign_face() {
        let enrolled = uuid(1);
        let caller = uuid(2);
        let (service, course) = service_with_course(uuid(50)).await;
        enroll_with_face(&service, enrolled, course).await;

        let err = service
            .identify_at(course, close_probe(), student_caller(caller), during_session())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_identify_no_match_and_validation() {
        let student = uuid(1);
        let (service, course) = service_with_course(uuid(50)).await;
        enroll_with_face(&service, student, course).await;

        let err = service
            .identify_at(course, far_probe(), student_caller(student), during_session())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NoMatch));

        let err = service
            .identify_at(
                course,
                Embedding::new(vec![]),
                student_caller(student),
                during_session(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidProbe));
    }

    #[tokio::test]
    async fn test_identify_unknown_course() {
        let (service, _) = service_with_course(uuid(50)).await;
        let err = service
            .identify_at(uuid(99), close_probe(), student_caller(uuid(1)), during_session())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::CourseNotFound(_)));
    }

    #[tokio::test]
    async fn test_cancelled_day_is_final_for_identification() {
        let student = uuid(1);
        let academician = uuid(50);
        let (service, course) = service_with_course(academician).await;
        enroll_with_face(&service, student, course).await;

        let cancelled = service
            .cancel_session(course, during_session().date(), academician_caller(academician))
            .await
            .unwrap();
        assert_eq!(cancelled, 1);

        let response = service
            .identify_at(course, close_probe(), student_caller(student), during_session())
            .await
            .unwrap();
        assert_eq!(response.attendance, Some(MarkOutcome::SessionCancelled));
        assert!(response.attendance_rate.is_none());
    }

    #[tokio::test]
    async fn test_cancel_session_requires_owning_academician() {
        let student = uuid(1);
        let (service, course) = service_with_course(uuid(50)).await;
        enroll_with_face(&service, student, course).await;

        let err = service
            .cancel_session(course, during_session().date(), academician_caller(uuid(51)))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        // Role table blocks students outright.
        let err = service
            .cancel_session(course, during_session().date(), student_caller(student))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_cancel_session_without_enrollees() {
        let academician = uuid(50);
        let (service, course) = service_with_course(academician).await;
        let err = service
            .cancel_session(course, during_session().date(), academician_caller(academician))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NoApprovedEnrollees(_)));
    }

    #[tokio::test]
    async fn test_batch_identify_reports_each_probe() {
        let academician = uuid(50);
        let (service, course) = service_with_course(academician).await;
        let student = uuid(1);
        enroll_with_face(&service, student, course).await;

        let entries = service
            .batch_identify_at(
                course,
                vec![close_probe(), close_probe(), far_probe()],
                academician_caller(academician),
                during_session(),
            )
            .await
            .unwrap();

        assert_eq!(entries.len(), 3);
        assert!(matches!(
            entries[0].outcome,
            BatchOutcome::Marked(MarkOutcome::Created)
        ));
        // Same student detected twice: reported, not re-created.
        assert!(matches!(
            entries[1].outcome,
            BatchOutcome::Marked(MarkOutcome::AlreadyPresent)
        ));
        assert!(matches!(entries[2].outcome, BatchOutcome::NoMatch));
        assert_eq!(
            service.store.records_for(student, course).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn test_batch_identify_requires_active_session() {
        let academician = uuid(50);
        let (service, course) = service_with_course(academician).await;
        let err = service
            .batch_identify_at(
                course,
                vec![close_probe()],
                academician_caller(academician),
                after_session(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::SessionNotActive));
    }

    #[tokio::test]
    async fn test_select_courses_only_for_self() {
        let (service, course) = service_with_course(uuid(50)).await;
        let err = service
            .select_courses(uuid(1), vec![course], student_caller(uuid(2)))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        let created = service
            .select_courses(uuid(1), vec![course], student_caller(uuid(1)))
            .await
            .unwrap();
        assert_eq!(created.len(), 1);
    }

    #[tokio::test]
    async fn test_review_enrollment_gates_on_course_owner() {
        let academician = uuid(50);
        let (service, course) = service_with_course(academician).await;
        let student = uuid(1);
        let created = service
            .select_courses(student, vec![course], student_caller(student))
            .await
            .unwrap();
        let enrollment_id = created[0].id;

        let err = service
            .review_enrollment(enrollment_id, true, academician_caller(uuid(51)))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        let reviewed = service
            .review_enrollment(enrollment_id, true, academician_caller(academician))
            .await
            .unwrap();
        assert_eq!(reviewed.approval, Approval::Approved);
        assert_eq!(
            service.store.approved_students(course).await.unwrap(),
            vec![student]
        );
    }
}
