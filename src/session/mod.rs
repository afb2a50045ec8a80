/// Render Session: silent encode plus external mux for one clip.
pub mod render_session;
