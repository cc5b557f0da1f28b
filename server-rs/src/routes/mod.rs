pub mod admin;
pub mod auth;
pub mod health;
pub mod invitations;
pub mod matches;
pub mod notifications;
pub mod players;
pub mod ratings;
pub mod requests;
