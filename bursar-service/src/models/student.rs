use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Student record the invoices are issued against.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Student {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub student_number: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub course: Option<String>,
    pub year_level: Option<i32>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StudentResponse {
    pub id: Uuid,
    pub student_number: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub course: Option<String>,
    pub year_level: Option<i32>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Student> for StudentResponse {
    fn from(s: Student) -> Self {
        Self {
            id: s.id,
            student_number: s.student_number,
            first_name: s.first_name,
            last_name: s.last_name,
            email: s.email,
            course: s.course,
            year_level: s.year_level,
            created_at: s.created_at.to_string(),
            updated_at: s.updated_at.to_string(),
        }
    }
}
