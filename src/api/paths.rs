//! Endpoint paths of the quiz server. These must match the existing backend exactly.

pub(crate) fn quiz(quiz_id: &str) -> String {
    format!("/api/quizzes/{quiz_id}")
}

pub(crate) fn quiz_questions(quiz_id: &str) -> String {
    format!("/api/quizzes/{quiz_id}/questions")
}

pub(crate) fn question(question_id: &str) -> String {
    format!("/api/questions/{question_id}")
}

pub(crate) fn quiz_results(quiz_id: &str) -> String {
    format!("/api/quizzes/{quiz_id}/results")
}

pub(crate) fn student_results(quiz_id: &str, student_id: &str) -> String {
    format!("/api/quizzes/{quiz_id}/results/{student_id}")
}

pub(crate) fn course_quizzes(course_id: &str) -> String {
    format!("/api/courses/{course_id}/quizzes")
}
