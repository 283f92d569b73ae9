use crossbeam_channel::Sender;

/// Yields the `Ok` values of `iter`; every `Err` is sent to `channel` instead.
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct SendErrors<'s, I, E> {
    iter: I,
    channel: &'s Sender<E>,
}

impl<I, T, E> Iterator for SendErrors<'_, I, E>
where
    I: Iterator<Item = Result<T, E>>,
{
    type Item = T;

    fn next(&mut self) -> Option<T> {
        for item in self.iter.by_ref() {
            match item {
                Ok(value) => return Some(value),
                // a disconnected receiver only loses the report, the item is still skipped
                Err(err) => drop(self.channel.send(err)),
            }
        }
        None
    }
}

pub trait SendErrorsExt<T, E>: Iterator<Item = Result<T, E>> + Sized {
    fn send_errors(self, channel: &Sender<E>) -> SendErrors<'_, Self, E> {
        SendErrors {
            iter: self,
            channel,
        }
    }
}

impl<I, T, E> SendErrorsExt<T, E> for I where I: Iterator<Item = Result<T, E>> {}
