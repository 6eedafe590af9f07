//! Role predicates.
//!
//! Institution comparisons only match when both sides name the same
//! institution; a user without an institution never matches anything.

use crate::model::{CurrentUser, InstitutionId, Role, UserId};

#[must_use]
pub fn has_role(role: Role, required: &[Role]) -> bool {
    required.contains(&role)
}

#[must_use]
pub fn is_admin(role: Role) -> bool {
    role == Role::Admin
}

#[must_use]
pub fn is_institution_admin(role: Role) -> bool {
    role == Role::InstitutionAdmin
}

fn same_institution(user: &CurrentUser, target: Option<InstitutionId>) -> bool {
    user.institution_id.is_some() && user.institution_id == target
}

#[must_use]
pub fn can_manage_institution(user: &CurrentUser, target: Option<InstitutionId>) -> bool {
    match user.role {
        Role::Admin => true,
        Role::InstitutionAdmin => same_institution(user, target),
        Role::Individual | Role::Viewer => false,
    }
}

#[must_use]
pub fn can_manage_user(
    user: &CurrentUser,
    target_user: UserId,
    target_institution: Option<InstitutionId>,
) -> bool {
    if is_admin(user.role) || user.id == target_user {
        return true;
    }
    is_institution_admin(user.role) && same_institution(user, target_institution)
}

/// Admins see everything, institution admins see exams of their
/// institution, everyone else may view the exams assigned to them.
#[must_use]
pub fn can_view_exam(user: &CurrentUser, exam_institution: Option<InstitutionId>) -> bool {
    match user.role {
        Role::Admin => true,
        Role::InstitutionAdmin => same_institution(user, exam_institution),
        Role::Individual | Role::Viewer => true,
    }
}

#[must_use]
pub fn can_create_exam(user: &CurrentUser) -> bool {
    is_admin(user.role) || is_institution_admin(user.role)
}

#[must_use]
pub fn can_update_exam(user: &CurrentUser, exam_institution: Option<InstitutionId>) -> bool {
    can_create_exam(user) && can_view_exam(user, exam_institution)
}
