/// Row Streaming Module
///
/// Native client libraries hand out result iterators that borrow the client
/// for as long as the result is open. A row set keeps its result across
/// calls, so the borrow cannot live on the caller's stack. Instead, the
/// session lends its client to a worker thread that walks the native
/// iterator and passes rows back one at a time, on request.
///
/// ## Lending
///
/// - [`ClientSlot::stream`] moves the client to a worker and returns a lazy
///   cursor over the result.
/// - Each [`NativeCursor::fetch`] asks the worker for exactly one row.
/// - When the session needs its client while a result is still open, the rest
///   of that result is read into the cursor's backlog and the client comes
///   back. Rows already handed out are never read twice.
use super::driver::{NativeCursor, NativeRow};
use crate::core::error::NativeError;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, trace};

/// Walks one native result, feeding rows into the sink.
pub type StreamFn<C> = fn(&mut C, &str, &mut RowSink) -> Result<(), NativeError>;

enum Control {
    Next,
    Stop,
}

enum Event {
    Header(Result<usize, NativeError>),
    Row(NativeRow),
    Failed(NativeError),
    End,
}

fn session_lost() -> NativeError {
    NativeError::Other("native session was lost while streaming a result".to_string())
}

/// Worker-side end of a streamed result.
pub struct RowSink {
    events: Sender<Event>,
    control: Receiver<Control>,
    started: bool,
}

impl RowSink {
    /// Announces the column count. Call once, before the first row.
    pub fn start(&mut self, columns: usize) {
        if !self.started {
            self.started = true;
            let _ = self.events.send(Event::Header(Ok(columns)));
        }
    }

    /// Blocks until the reader asks for another row. `false` means the reader
    /// is done and the native result should be dropped.
    pub fn wants_row(&mut self) -> bool {
        matches!(self.control.recv(), Ok(Control::Next))
    }

    pub fn push(&mut self, row: NativeRow) {
        let _ = self.events.send(Event::Row(row));
    }

    fn finish(mut self, outcome: Result<(), NativeError>) {
        let event = match outcome {
            Ok(()) => {
                self.start(0);
                Event::End
            }
            Err(e) if self.started => Event::Failed(e),
            Err(e) => Event::Header(Err(e)),
        };
        let _ = self.events.send(event);
    }
}

/// Reader-side end of a streamed result, shared by the cursor and the slot
/// the client was lent from.
struct Pump<C> {
    control: Sender<Control>,
    events: Receiver<Event>,
    worker: Option<JoinHandle<C>>,
    backlog: VecDeque<Event>,
    done: bool,
}

impl<C> Pump<C> {
    fn next_event(&mut self) -> Event {
        if let Some(event) = self.backlog.pop_front() {
            return event;
        }
        if self.done {
            return Event::End;
        }
        self.pull()
    }

    fn pull(&mut self) -> Event {
        if self.control.send(Control::Next).is_err() {
            self.done = true;
            return Event::Failed(session_lost());
        }
        let event = self.events.recv().unwrap_or_else(|_| Event::Failed(session_lost()));
        if !matches!(event, Event::Row(_)) {
            self.done = true;
        }
        event
    }

    /// Reads the rest of the result into the backlog.
    fn park(&mut self) {
        let mut parked = 0usize;
        while !self.done {
            let event = self.pull();
            parked += 1;
            self.backlog.push_back(event);
        }
        if parked > 0 {
            debug!(rows = parked, "Buffered unread rows to free the session");
        }
    }

    /// Drops the rest of the result without reading it.
    fn stop(&mut self) {
        if !self.done {
            let _ = self.control.send(Control::Stop);
            self.done = true;
        }
        self.backlog.clear();
    }

    /// Waits for the worker and takes the client back.
    fn reclaim(&mut self) -> Option<C> {
        self.park();
        let worker = self.worker.take()?;
        match worker.join() {
            Ok(client) => Some(client),
            Err(_) => {
                error!("Streaming worker panicked; native session lost");
                None
            }
        }
    }
}

enum SlotState<C> {
    Idle(C),
    Lent(Rc<RefCell<Pump<C>>>),
    Lost,
}

/// Owner of a native client that may be lent out to a streaming result.
pub struct ClientSlot<C> {
    state: SlotState<C>,
}

impl<C: Send + 'static> ClientSlot<C> {
    pub fn new(client: C) -> Self {
        ClientSlot {
            state: SlotState::Idle(client),
        }
    }

    /// The client, taken back from an open result first if needed.
    pub fn client(&mut self) -> Result<&mut C, NativeError> {
        if let SlotState::Lent(pump) = &self.state {
            let client = pump.borrow_mut().reclaim();
            self.restore(client);
        }
        match &mut self.state {
            SlotState::Idle(client) => Ok(client),
            _ => Err(session_lost()),
        }
    }

    /// Runs `sql` on a worker and returns a cursor that reads its rows lazily.
    ///
    /// Errors raised before the first row is requested, such as a prepare
    /// failure, are returned here; later ones surface from `fetch`.
    pub fn stream(&mut self, sql: &str, run: StreamFn<C>) -> Result<Box<dyn NativeCursor>, NativeError> {
        self.client()?;
        let client = match std::mem::replace(&mut self.state, SlotState::Lost) {
            SlotState::Idle(client) => client,
            _ => return Err(session_lost()),
        };

        let (control_tx, control_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let sql = sql.to_string();
        let worker = thread::Builder::new()
            .name("rowbind-stream".to_string())
            .spawn(move || {
                let mut client = client;
                let mut sink = RowSink {
                    events: event_tx,
                    control: control_rx,
                    started: false,
                };
                let outcome = run(&mut client, &sql, &mut sink);
                sink.finish(outcome);
                client
            })
            .map_err(|e| NativeError::Other(format!("cannot start streaming worker: {}", e)))?;

        let mut pump = Pump {
            control: control_tx,
            events: event_rx,
            worker: Some(worker),
            backlog: VecDeque::new(),
            done: false,
        };
        let header = pump.events.recv();
        match header {
            Ok(Event::Header(Ok(columns))) => {
                trace!(columns, "Streaming result opened");
                let pump = Rc::new(RefCell::new(pump));
                self.state = SlotState::Lent(Rc::clone(&pump));
                Ok(Box::new(StreamCursor {
                    pump,
                    columns,
                    current: None,
                }))
            }
            Ok(Event::Header(Err(e))) => {
                pump.done = true;
                self.restore(pump.reclaim());
                Err(e)
            }
            _ => {
                pump.stop();
                self.restore(pump.reclaim());
                Err(session_lost())
            }
        }
    }

    /// Takes the client back for good, closing any open result.
    pub fn into_client(mut self) -> Option<C> {
        self.client().ok()?;
        match self.state {
            SlotState::Idle(client) => Some(client),
            _ => None,
        }
    }

    fn restore(&mut self, client: Option<C>) {
        self.state = match client {
            Some(client) => SlotState::Idle(client),
            None => SlotState::Lost,
        };
    }
}

/// Lazy cursor over a result walked by a streaming worker.
struct StreamCursor<C> {
    pump: Rc<RefCell<Pump<C>>>,
    columns: usize,
    current: Option<NativeRow>,
}

impl<C> NativeCursor for StreamCursor<C> {
    fn column_count(&self) -> usize {
        self.columns
    }

    fn row_count(&self) -> Option<u64> {
        None
    }

    fn fetch(&mut self) -> Result<bool, NativeError> {
        self.current = None;
        match self.pump.borrow_mut().next_event() {
            Event::Row(row) => {
                self.current = Some(row);
                Ok(true)
            }
            Event::Failed(e) | Event::Header(Err(e)) => Err(e),
            Event::Header(Ok(_)) | Event::End => Ok(false),
        }
    }

    fn column(&self, index: usize) -> Option<&[u8]> {
        self.current.as_ref()?.get(index)?.as_deref()
    }

    fn close(&mut self) {
        self.current = None;
        self.pump.borrow_mut().stop();
    }
}

impl<C> Drop for StreamCursor<C> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Client whose "result" is a fixed list of numbers, failing at `fail_at`.
    #[derive(Debug, Default)]
    struct Counter {
        rows: Vec<i64>,
        fail_at: Option<usize>,
        served: usize,
        statements: Vec<String>,
    }

    fn walk(client: &mut Counter, sql: &str, sink: &mut RowSink) -> Result<(), NativeError> {
        if sql == "bad" {
            return Err(NativeError::Other("syntax error".to_string()));
        }
        client.statements.push(sql.to_string());
        sink.start(1);
        let mut position = 0;
        while sink.wants_row() {
            if client.fail_at == Some(position) {
                return Err(NativeError::Other("row decode failed".to_string()));
            }
            let Some(value) = client.rows.get(position) else {
                break;
            };
            client.served += 1;
            sink.push(vec![Some(value.to_string().into_bytes())]);
            position += 1;
        }
        Ok(())
    }

    fn slot(rows: &[i64], fail_at: Option<usize>) -> ClientSlot<Counter> {
        ClientSlot::new(Counter {
            rows: rows.to_vec(),
            fail_at,
            ..Counter::default()
        })
    }

    #[test]
    fn test_rows_are_pulled_one_at_a_time() {
        let mut slot = slot(&[1, 2, 3], None);
        let mut cursor = slot.stream("all", walk).unwrap();
        assert_eq!(cursor.column_count(), 1);
        assert_eq!(cursor.row_count(), None);
        assert!(cursor.fetch().unwrap());
        assert_eq!(cursor.column(0), Some(&b"1"[..]));
        cursor.close();
        assert_eq!(slot.client().unwrap().served, 1);
    }

    #[test]
    fn test_prepare_error_is_returned_by_stream() {
        let mut slot = slot(&[1], None);
        let err = slot.stream("bad", walk).err().unwrap();
        assert!(err.to_string().contains("syntax error"));
        assert!(slot.client().unwrap().statements.is_empty());
    }

    #[test]
    fn test_row_error_surfaces_from_fetch_after_earlier_rows() {
        let mut slot = slot(&[7, 8, 9], Some(1));
        let mut cursor = slot.stream("all", walk).unwrap();
        assert!(cursor.fetch().unwrap());
        assert_eq!(cursor.column(0), Some(&b"7"[..]));
        assert!(cursor.fetch().is_err());
        assert!(!cursor.fetch().unwrap());
        drop(cursor);
        assert_eq!(slot.client().unwrap().served, 1);
    }

    #[test]
    fn test_session_use_parks_the_open_result() {
        let mut slot = slot(&[1, 2, 3], None);
        let mut cursor = slot.stream("first", walk).unwrap();
        assert!(cursor.fetch().unwrap());

        slot.client().unwrap().statements.push("update".to_string());

        assert!(cursor.fetch().unwrap());
        assert_eq!(cursor.column(0), Some(&b"2"[..]));
        assert!(cursor.fetch().unwrap());
        assert!(!cursor.fetch().unwrap());
        assert_eq!(slot.client().unwrap().statements, vec!["first", "update"]);
    }

    #[test]
    fn test_second_stream_parks_the_first() {
        let mut slot = slot(&[1, 2], None);
        let mut first = slot.stream("first", walk).unwrap();
        let mut second = slot.stream("second", walk).unwrap();
        assert!(second.fetch().unwrap());
        assert!(first.fetch().unwrap());
        assert!(first.fetch().unwrap());
        assert!(!first.fetch().unwrap());
        second.close();
        assert!(slot.into_client().is_some());
    }
}
