pub mod attendee;
pub mod checkin;
pub mod judging;
pub mod profile;
