pub mod cash_movement;
pub mod cashier_session;
pub mod establishment;
pub mod order;
pub mod order_item;
pub mod order_status_history;
pub mod payment;
pub mod payment_method;
pub mod product;
pub mod sale;
