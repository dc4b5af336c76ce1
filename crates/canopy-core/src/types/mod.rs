mod keyed_list;

pub use keyed_list::KeyedList;
