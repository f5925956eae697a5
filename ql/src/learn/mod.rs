pub mod q_table;
pub mod q_table_agent;
pub mod ring_buffer;
