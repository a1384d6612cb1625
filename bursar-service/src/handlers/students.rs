use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use mongodb::bson::DateTime;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::models::{Student, StudentResponse};
use crate::services::AppError;
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateStudentRequest {
    pub student_number: Option<String>,
    #[validate(length(min = 1, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, message = "Last name is required"))]
    pub last_name: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    pub course: Option<String>,
    pub year_level: Option<i32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateStudentRequest {
    pub student_number: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    pub course: Option<String>,
    pub year_level: Option<i32>,
}

pub async fn create_student(
    State(state): State<AppState>,
    Json(payload): Json<CreateStudentRequest>,
) -> Result<(StatusCode, Json<StudentResponse>), AppError> {
    payload.validate()?;

    let now = DateTime::now();
    let student = Student {
        id: Uuid::new_v4(),
        student_number: payload.student_number,
        first_name: payload.first_name,
        last_name: payload.last_name,
        email: payload.email,
        course: payload.course,
        year_level: payload.year_level,
        created_at: now,
        updated_at: now,
    };

    state.store.insert_student(student.clone()).await?;
    tracing::info!(student_id = %student.id, "Student created");

    Ok((StatusCode::CREATED, Json(StudentResponse::from(student))))
}

pub async fn list_students(
    State(state): State<AppState>,
) -> Result<Json<Vec<StudentResponse>>, AppError> {
    let students = state.store.list_students().await?;
    Ok(Json(
        students.into_iter().map(StudentResponse::from).collect(),
    ))
}

pub async fn get_student(
    State(state): State<AppState>,
    Path(student_id): Path<Uuid>,
) -> Result<Json<StudentResponse>, AppError> {
    let student = state
        .store
        .get_student(student_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Student not found")))?;

    Ok(Json(StudentResponse::from(student)))
}

pub async fn update_student(
    State(state): State<AppState>,
    Path(student_id): Path<Uuid>,
    Json(payload): Json<UpdateStudentRequest>,
) -> Result<Json<StudentResponse>, AppError> {
    payload.validate()?;

    let mut student = state
        .store
        .get_student(student_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Student not found")))?;

    if let Some(student_number) = payload.student_number {
        student.student_number = Some(student_number);
    }
    if let Some(first_name) = payload.first_name {
        student.first_name = first_name;
    }
    if let Some(last_name) = payload.last_name {
        student.last_name = last_name;
    }
    if let Some(email) = payload.email {
        student.email = email;
    }
    if let Some(course) = payload.course {
        student.course = Some(course);
    }
    if let Some(year_level) = payload.year_level {
        student.year_level = Some(year_level);
    }
    student.updated_at = DateTime::now();

    let updated = state
        .store
        .update_student(&student)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Student not found")))?;

    Ok(Json(StudentResponse::from(updated)))
}

pub async fn delete_student(
    State(state): State<AppState>,
    Path(student_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.store.delete_student(student_id).await? {
        tracing::info!(student_id = %student_id, "Student deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(anyhow::anyhow!("Student not found")))
    }
}
