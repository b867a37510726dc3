pub mod hall;
pub mod session;
pub mod ticket;

pub use hall::Hall;
pub use session::Session;
pub use ticket::{NewTicket, SeatTier, Ticket, TicketStatus};
